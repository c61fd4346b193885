use bigdecimal::BigDecimal;
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use servelink_domain::{menu::validate_price, MenuFilter};
use tracing::info;
use uuid::Uuid;

use crate::events::{ChangeEvent, ChangeEventPublisher, ChangeTable};
use crate::models::{MenuCategory, MenuCategoryChanges, MenuItem, MenuItemChanges};
use crate::{schema, ServiceError};

pub const DEFAULT_PREPARATION_MINUTES: i32 = 15;

#[derive(Clone, Debug)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
}

impl CategoryInput {
    fn validate(self) -> Result<MenuCategoryChanges, ServiceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::invalid("category name must not be empty"));
        }
        Ok(MenuCategoryChanges {
            name,
            description: non_blank(self.description),
            is_active: self.is_active,
            display_order: self.display_order,
        })
    }
}

#[derive(Clone, Debug)]
pub struct MenuItemInput {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub preparation_time: i32,
    pub is_veg: bool,
    pub is_available: bool,
    pub image_url: Option<String>,
}

impl MenuItemInput {
    fn validate(self) -> Result<MenuItemChanges, ServiceError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::invalid("item name must not be empty"));
        }
        validate_price(&self.price).map_err(|e| ServiceError::invalid(format!("price: {e}")))?;
        if self.preparation_time < 0 {
            return Err(ServiceError::invalid(
                "preparation time must not be negative",
            ));
        }
        Ok(MenuItemChanges {
            category_id: self.category_id,
            name,
            description: non_blank(self.description),
            price: self.price.with_scale(2),
            preparation_time: self.preparation_time,
            is_veg: self.is_veg,
            is_available: self.is_available,
            image_url: non_blank(self.image_url),
        })
    }
}

/// What a customer sees after scanning a table's QR code.
#[derive(Serialize, Clone, Debug)]
pub struct PublicMenu {
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub categories: Vec<MenuCategory>,
    pub items: Vec<MenuItem>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn list_categories(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    active_only: bool,
) -> Result<Vec<MenuCategory>, ServiceError> {
    let mut query = schema::menu_categories::table
        .filter(schema::menu_categories::restaurant_id.eq(restaurant_id))
        .select(MenuCategory::as_select())
        .order((
            schema::menu_categories::display_order.asc(),
            schema::menu_categories::name.asc(),
        ))
        .into_boxed();
    if active_only {
        query = query.filter(schema::menu_categories::is_active.eq(true));
    }
    Ok(query.load(conn).await?)
}

pub async fn create_category(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    input: CategoryInput,
) -> Result<MenuCategory, ServiceError> {
    let changes = input.validate()?;
    let category = MenuCategory {
        id: Uuid::new_v4(),
        restaurant_id,
        name: changes.name,
        description: changes.description,
        is_active: changes.is_active,
        display_order: changes.display_order,
    };

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            diesel::insert_into(schema::menu_categories::table)
                .values(&category)
                .execute(conn)
                .await?;
            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::inserted(
                    ChangeTable::MenuCategories,
                    category.id,
                    restaurant_id,
                    &category,
                )?)
                .await?;
            Ok(category)
        }
        .scope_boxed()
    })
    .await
}

pub async fn update_category(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    category_id: Uuid,
    input: CategoryInput,
) -> Result<MenuCategory, ServiceError> {
    let changes = input.validate()?;

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let category: MenuCategory = diesel::update(
                schema::menu_categories::table
                    .filter(schema::menu_categories::id.eq(category_id))
                    .filter(schema::menu_categories::restaurant_id.eq(restaurant_id)),
            )
            .set(&changes)
            .returning(MenuCategory::as_returning())
            .get_result(conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound("category"))?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::MenuCategories,
                    category.id,
                    restaurant_id,
                    &category,
                )?)
                .await?;
            Ok(category)
        }
        .scope_boxed()
    })
    .await
}

/// Items of a deleted category stay on the menu without a category.
pub async fn delete_category(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    category_id: Uuid,
) -> Result<(), ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let deleted = diesel::delete(
                schema::menu_categories::table
                    .filter(schema::menu_categories::id.eq(category_id))
                    .filter(schema::menu_categories::restaurant_id.eq(restaurant_id)),
            )
            .execute(conn)
            .await?;
            if deleted == 0 {
                return Err(ServiceError::NotFound("category"));
            }

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::deleted(
                    ChangeTable::MenuCategories,
                    category_id,
                    restaurant_id,
                ))
                .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

pub async fn list_items(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    available_only: bool,
    filter: MenuFilter,
) -> Result<Vec<MenuItem>, ServiceError> {
    let mut query = schema::menu_items::table
        .filter(schema::menu_items::restaurant_id.eq(restaurant_id))
        .select(MenuItem::as_select())
        .order(schema::menu_items::name.asc())
        .into_boxed();
    if available_only {
        query = query.filter(schema::menu_items::is_available.eq(true));
    }
    if let MenuFilter::Category(category_id) = filter {
        query = query.filter(schema::menu_items::category_id.eq(category_id));
    }
    Ok(query.load(conn).await?)
}

pub async fn get_item(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    item_id: Uuid,
) -> Result<MenuItem, ServiceError> {
    schema::menu_items::table
        .filter(schema::menu_items::id.eq(item_id))
        .filter(schema::menu_items::restaurant_id.eq(restaurant_id))
        .select(MenuItem::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound("menu item"))
}

async fn ensure_category(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    category_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    let Some(category_id) = category_id else {
        return Ok(());
    };
    let found = schema::menu_categories::table
        .filter(schema::menu_categories::id.eq(category_id))
        .filter(schema::menu_categories::restaurant_id.eq(restaurant_id))
        .select(schema::menu_categories::id)
        .first::<Uuid>(conn)
        .await
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(ServiceError::invalid(
            "category does not belong to this restaurant",
        )),
    }
}

pub async fn create_item(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    input: MenuItemInput,
) -> Result<MenuItem, ServiceError> {
    let changes = input.validate()?;
    let item = MenuItem {
        id: Uuid::new_v4(),
        restaurant_id,
        category_id: changes.category_id,
        name: changes.name,
        description: changes.description,
        price: changes.price,
        preparation_time: changes.preparation_time,
        is_veg: changes.is_veg,
        is_available: changes.is_available,
        image_url: changes.image_url,
    };

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            ensure_category(conn, restaurant_id, item.category_id).await?;
            diesel::insert_into(schema::menu_items::table)
                .values(&item)
                .execute(conn)
                .await?;
            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::inserted(
                    ChangeTable::MenuItems,
                    item.id,
                    restaurant_id,
                    &item,
                )?)
                .await?;
            info!(%restaurant_id, item_id = %item.id, "menu item created");
            Ok(item)
        }
        .scope_boxed()
    })
    .await
}

pub async fn update_item(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    item_id: Uuid,
    input: MenuItemInput,
) -> Result<MenuItem, ServiceError> {
    let changes = input.validate()?;

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            ensure_category(conn, restaurant_id, changes.category_id).await?;
            let item: MenuItem = diesel::update(
                schema::menu_items::table
                    .filter(schema::menu_items::id.eq(item_id))
                    .filter(schema::menu_items::restaurant_id.eq(restaurant_id)),
            )
            .set(&changes)
            .returning(MenuItem::as_returning())
            .get_result(conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound("menu item"))?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::MenuItems,
                    item.id,
                    restaurant_id,
                    &item,
                )?)
                .await?;
            Ok(item)
        }
        .scope_boxed()
    })
    .await
}

/// Flips availability without touching anything else.
pub async fn set_availability(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    item_id: Uuid,
    is_available: bool,
) -> Result<MenuItem, ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let item: MenuItem = diesel::update(
                schema::menu_items::table
                    .filter(schema::menu_items::id.eq(item_id))
                    .filter(schema::menu_items::restaurant_id.eq(restaurant_id)),
            )
            .set(schema::menu_items::is_available.eq(is_available))
            .returning(MenuItem::as_returning())
            .get_result(conn)
            .await
            .optional()?
            .ok_or(ServiceError::NotFound("menu item"))?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::MenuItems,
                    item.id,
                    restaurant_id,
                    &item,
                )?)
                .await?;
            Ok(item)
        }
        .scope_boxed()
    })
    .await
}

/// Fails with `Conflict` while past orders still reference the item.
pub async fn delete_item(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    item_id: Uuid,
) -> Result<(), ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let deleted = diesel::delete(
                schema::menu_items::table
                    .filter(schema::menu_items::id.eq(item_id))
                    .filter(schema::menu_items::restaurant_id.eq(restaurant_id)),
            )
            .execute(conn)
            .await?;
            if deleted == 0 {
                return Err(ServiceError::NotFound("menu item"));
            }

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::deleted(
                    ChangeTable::MenuItems,
                    item_id,
                    restaurant_id,
                ))
                .await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await
}

/// Active categories and available items, narrowed by `filter`. Items
/// without a category only show up under [`MenuFilter::All`].
pub async fn public_menu(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    filter: MenuFilter,
) -> Result<PublicMenu, ServiceError> {
    let restaurant = crate::restaurants::get(conn, restaurant_id).await?;
    let categories = list_categories(conn, restaurant_id, true).await?;
    let items = list_items(conn, restaurant_id, true, MenuFilter::All).await?;

    Ok(PublicMenu {
        restaurant_id,
        restaurant_name: restaurant.name,
        categories,
        items: filter.apply(items, |item| item.category_id),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item_input(price: &str) -> MenuItemInput {
        MenuItemInput {
            category_id: None,
            name: "  Masala Dosa ".to_string(),
            description: Some("   ".to_string()),
            price: BigDecimal::from_str(price).unwrap(),
            preparation_time: DEFAULT_PREPARATION_MINUTES,
            is_veg: true,
            is_available: true,
            image_url: None,
        }
    }

    #[test]
    fn test_item_input_is_normalized() {
        let changes = item_input("120.5").validate().unwrap();
        assert_eq!(changes.name, "Masala Dosa");
        assert_eq!(changes.description, None);
        assert_eq!(changes.price.to_string(), "120.50");
    }

    #[test]
    fn test_negative_price_is_rejected() {
        assert!(matches!(
            item_input("-5").validate(),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_price_must_fit_money_column() {
        for price in ["100000000", "10.999"] {
            assert!(matches!(
                item_input(price).validate(),
                Err(ServiceError::InvalidArgument(_))
            ));
        }
        let changes = item_input("99999999.99").validate().unwrap();
        assert_eq!(changes.price.to_string(), "99999999.99");
    }

    #[test]
    fn test_blank_category_name_is_rejected() {
        let input = CategoryInput {
            name: " ".to_string(),
            description: None,
            is_active: true,
            display_order: 0,
        };
        assert!(input.validate().is_err());
    }
}
