use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

use crate::events::{ChangeEvent, ChangeEventPublisher, ChangeTable};
use crate::models::{self, Profile, Restaurant};
use crate::{schema, ServiceError};

pub const DEFAULT_RESTAURANT_NAME: &str = "My Restaurant";

pub fn default_name(full_name: Option<&str>) -> String {
    match full_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{name}'s Restaurant"),
        None => DEFAULT_RESTAURANT_NAME.to_string(),
    }
}

pub async fn get(conn: &mut AsyncPgConnection, id: Uuid) -> Result<Restaurant, ServiceError> {
    schema::restaurants::table
        .find(id)
        .select(Restaurant::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound("restaurant"))
}

pub async fn owned_by(
    conn: &mut AsyncPgConnection,
    owner_id: Uuid,
) -> Result<Option<Restaurant>, ServiceError> {
    Ok(schema::restaurants::table
        .filter(schema::restaurants::owner_id.eq(owner_id))
        .order(schema::restaurants::created_at.asc())
        .select(Restaurant::as_select())
        .first(conn)
        .await
        .optional()?)
}

/// Finds the restaurant a signed-in user works for.
///
/// Kitchen and waiter staff use the restaurant they are assigned to. Anyone
/// else is treated as an owner and gets the restaurant they own, which is
/// created on the spot the first time.
pub async fn resolve_for_user(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<(Restaurant, servelink_domain::StaffRole), ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let profile = schema::profiles::table
                .find(user_id)
                .select(Profile::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?;

            if let Some(profile) = &profile {
                if profile.role != models::StaffRole::Owner {
                    let restaurant_id = profile.restaurant_id.ok_or_else(|| {
                        ServiceError::forbidden("not assigned to a restaurant")
                    })?;
                    let restaurant = get(conn, restaurant_id).await?;
                    return Ok((restaurant, profile.role.into()));
                }
            }

            if let Some(restaurant) = owned_by(conn, user_id).await? {
                return Ok((restaurant, servelink_domain::StaffRole::Owner));
            }

            let restaurant = Restaurant {
                id: Uuid::new_v4(),
                name: default_name(profile.as_ref().and_then(|p| p.full_name.as_deref())),
                owner_id: user_id,
                order_sequence: 0,
                created_at: Utc::now(),
            };
            diesel::insert_into(schema::restaurants::table)
                .values(&restaurant)
                .execute(conn)
                .await?;
            if profile.is_some() {
                diesel::update(schema::profiles::table.find(user_id))
                    .set(schema::profiles::restaurant_id.eq(Some(restaurant.id)))
                    .execute(conn)
                    .await?;
            }

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::inserted(
                    ChangeTable::Restaurants,
                    restaurant.id,
                    restaurant.id,
                    &restaurant,
                )?)
                .await?;

            info!(restaurant_id = %restaurant.id, owner_id = %user_id, "restaurant created");
            Ok((restaurant, servelink_domain::StaffRole::Owner))
        }
        .scope_boxed()
    })
    .await
}

/// Role `user_id` plays in `restaurant_id`, or `Forbidden` when none.
pub async fn access(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<servelink_domain::StaffRole, ServiceError> {
    let restaurant = get(conn, restaurant_id).await?;
    if restaurant.owner_id == user_id {
        return Ok(servelink_domain::StaffRole::Owner);
    }

    let profile = schema::profiles::table
        .find(user_id)
        .select(Profile::as_select())
        .first(conn)
        .await
        .optional()?;
    match profile {
        Some(Profile {
            restaurant_id: Some(rid),
            role,
            ..
        }) if rid == restaurant_id && role != models::StaffRole::Owner => Ok(role.into()),
        _ => Err(ServiceError::forbidden("no access to this restaurant")),
    }
}

pub async fn require_owner(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    restaurant_id: Uuid,
) -> Result<(), ServiceError> {
    match access(conn, user_id, restaurant_id).await? {
        servelink_domain::StaffRole::Owner => Ok(()),
        _ => Err(ServiceError::forbidden("only the owner can do this")),
    }
}

pub async fn rename(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    name: &str,
) -> Result<Restaurant, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid("restaurant name must not be empty"));
    }

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let restaurant: Restaurant = diesel::update(schema::restaurants::table.find(restaurant_id))
                .set(schema::restaurants::name.eq(name))
                .returning(Restaurant::as_returning())
                .get_result(conn)
                .await
                .optional()?
                .ok_or(ServiceError::NotFound("restaurant"))?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::Restaurants,
                    restaurant.id,
                    restaurant.id,
                    &restaurant,
                )?)
                .await?;
            Ok(restaurant)
        }
        .scope_boxed()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name() {
        assert_eq!(default_name(Some("Asha")), "Asha's Restaurant");
        assert_eq!(default_name(Some("  ")), "My Restaurant");
        assert_eq!(default_name(None), "My Restaurant");
    }
}
