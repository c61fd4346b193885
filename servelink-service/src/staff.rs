use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::events::{ChangeEvent, ChangeEventPublisher, ChangeTable};
use crate::models::{self, Profile, User};
use crate::{schema, ServiceError};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct StaffMember {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: servelink_domain::StaffRole,
    pub restaurant_id: Option<Uuid>,
}

impl StaffMember {
    fn new(profile: Profile, username: String) -> Self {
        Self {
            user_id: profile.user_id,
            username,
            full_name: profile.full_name,
            role: profile.role.into(),
            restaurant_id: profile.restaurant_id,
        }
    }
}

pub async fn get_member(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
) -> Result<StaffMember, ServiceError> {
    let (profile, username) = schema::profiles::table
        .inner_join(schema::users::table)
        .filter(schema::profiles::user_id.eq(user_id))
        .select((Profile::as_select(), schema::users::username))
        .first::<(Profile, String)>(conn)
        .await
        .optional()?
        .ok_or(ServiceError::NotFound("profile"))?;
    Ok(StaffMember::new(profile, username))
}

/// Everyone linked to the restaurant, owner included.
pub async fn list(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
) -> Result<Vec<StaffMember>, ServiceError> {
    let rows = schema::profiles::table
        .inner_join(schema::users::table)
        .filter(schema::profiles::restaurant_id.eq(restaurant_id))
        .order(schema::users::username.asc())
        .select((Profile::as_select(), schema::users::username))
        .load::<(Profile, String)>(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(profile, username)| StaffMember::new(profile, username))
        .collect())
}

/// Links an existing user to the restaurant as kitchen or waiter staff.
pub async fn assign(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    username: &str,
    role: servelink_domain::StaffRole,
    full_name: Option<String>,
) -> Result<StaffMember, ServiceError> {
    if role.manages_restaurant() {
        return Err(ServiceError::invalid("staff role must be kitchen or waiter"));
    }
    let username = username.trim();

    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let user = schema::users::table
                .filter(schema::users::username.eq(username))
                .select(User::as_select())
                .first(conn)
                .await
                .optional()?
                .ok_or(ServiceError::NotFound("user"))?;

            let owns_restaurant = schema::restaurants::table
                .filter(schema::restaurants::owner_id.eq(user.id))
                .select(schema::restaurants::id)
                .first::<Uuid>(conn)
                .await
                .optional()?
                .is_some();
            if owns_restaurant {
                return Err(ServiceError::Conflict(format!(
                    "{username} owns a restaurant and cannot join as staff"
                )));
            }

            let existing = schema::profiles::table
                .find(user.id)
                .select(Profile::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?;
            if let Some(Profile {
                restaurant_id: Some(rid),
                role: current,
                ..
            }) = &existing
            {
                if *rid != restaurant_id && *current != models::StaffRole::Owner {
                    return Err(ServiceError::Conflict(format!(
                        "{username} already works for another restaurant"
                    )));
                }
            }

            let profile = Profile {
                user_id: user.id,
                full_name: full_name
                    .filter(|n| !n.trim().is_empty())
                    .or_else(|| existing.as_ref().and_then(|p| p.full_name.clone())),
                role: role.into(),
                restaurant_id: Some(restaurant_id),
            };
            diesel::insert_into(schema::profiles::table)
                .values(&profile)
                .on_conflict(schema::profiles::user_id)
                .do_update()
                .set((
                    schema::profiles::full_name.eq(&profile.full_name),
                    schema::profiles::role.eq(profile.role),
                    schema::profiles::restaurant_id.eq(profile.restaurant_id),
                ))
                .execute(conn)
                .await?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::Profiles,
                    profile.user_id,
                    restaurant_id,
                    &profile,
                )?)
                .await?;

            info!(%restaurant_id, user_id = %user.id, role = %role, "staff assigned");
            Ok(StaffMember::new(profile, user.username))
        }
        .scope_boxed()
    })
    .await
}

pub async fn unassign(
    conn: &mut AsyncPgConnection,
    restaurant_id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let profile = schema::profiles::table
                .find(user_id)
                .filter(schema::profiles::restaurant_id.eq(restaurant_id))
                .select(Profile::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?
                .ok_or(ServiceError::NotFound("staff member"))?;
            if profile.role == models::StaffRole::Owner {
                return Err(ServiceError::invalid("the owner cannot be removed"));
            }

            let profile: Profile = diesel::update(schema::profiles::table.find(user_id))
                .set(schema::profiles::restaurant_id.eq(None::<Uuid>))
                .returning(Profile::as_returning())
                .get_result(conn)
                .await?;

            ChangeEventPublisher::new(conn)
                .publish(ChangeEvent::updated(
                    ChangeTable::Profiles,
                    user_id,
                    restaurant_id,
                    &profile,
                )?)
                .await?;

            info!(%restaurant_id, %user_id, "staff removed");
            Ok(())
        }
        .scope_boxed()
    })
    .await
}
