//! Room join policy
//!
//! Joins are unauthenticated by default: anyone who knows a restaurant id can
//! watch its `new_order` stream. `ROOM_ACCESS=staff_token` closes that for
//! restaurant rooms. Order rooms stay open in both modes since the order id
//! itself is the customer's capability.

use async_trait::async_trait;
use shared::message::ClientEvent;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{CurrentUser, JwtService, StaffAuthorizer};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AccessDenied(pub String);

/// Configured join policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomAccessMode {
    #[default]
    Open,
    StaffToken,
}

impl FromStr for RoomAccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "open" => Ok(Self::Open),
            "staff_token" => Ok(Self::StaffToken),
            other => Err(format!("unknown room access mode: {other}")),
        }
    }
}

/// Decides whether a connection may join a room
#[async_trait]
pub trait RoomAccess: Send + Sync {
    /// `connection_user` is the identity established at upgrade time, if any
    async fn authorize_join(
        &self,
        event: &ClientEvent,
        connection_user: Option<&CurrentUser>,
    ) -> Result<(), AccessDenied>;
}

/// Every join is accepted
pub struct OpenRoomAccess;

#[async_trait]
impl RoomAccess for OpenRoomAccess {
    async fn authorize_join(
        &self,
        _event: &ClientEvent,
        _connection_user: Option<&CurrentUser>,
    ) -> Result<(), AccessDenied> {
        Ok(())
    }
}

/// Restaurant rooms require a staff token for that restaurant
///
/// The token may come from the join frame (`{"id": .., "token": ..}`) or from
/// the `?token=` used when the socket was opened; the frame wins.
pub struct StaffTokenAccess {
    jwt: JwtService,
    authorizer: Arc<dyn StaffAuthorizer>,
}

impl StaffTokenAccess {
    pub fn new(jwt: JwtService, authorizer: Arc<dyn StaffAuthorizer>) -> Self {
        Self { jwt, authorizer }
    }
}

#[async_trait]
impl RoomAccess for StaffTokenAccess {
    async fn authorize_join(
        &self,
        event: &ClientEvent,
        connection_user: Option<&CurrentUser>,
    ) -> Result<(), AccessDenied> {
        let ClientEvent::JoinRestaurant(target) = event else {
            return Ok(());
        };

        let frame_user = match target.token() {
            Some(token) => Some(
                self.jwt
                    .validate_token(token)
                    .map(CurrentUser::from)
                    .map_err(|e| AccessDenied(format!("Invalid token: {e}")))?,
            ),
            None => None,
        };

        let Some(user) = frame_user.as_ref().or(connection_user) else {
            return Err(AccessDenied(
                "Authentication required to join restaurant room".to_string(),
            ));
        };

        if self.authorizer.is_staff(user, target.id()).await {
            Ok(())
        } else {
            Err(AccessDenied("Not authorized for this restaurant".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{JwtConfig, ROLE_STAFF};
    use crate::auth::DirectoryAuthorizer;
    use crate::directory::{InMemoryDirectory, Restaurant};
    use shared::message::RoomTarget;

    const SECRET: &str = "room-access-secret-long-enough-for-hs256";

    fn access() -> (StaffTokenAccess, JwtService) {
        let directory = InMemoryDirectory::new();
        directory.upsert_restaurant(Restaurant {
            id: "r1".into(),
            name: "Bistro".into(),
            address: String::new(),
            owner_id: "owner".into(),
            staff_ids: vec![],
        });
        let jwt = JwtService::with_config(JwtConfig::with_secret(SECRET));
        let authorizer = Arc::new(DirectoryAuthorizer::new(Arc::new(directory)));
        (StaffTokenAccess::new(jwt.clone(), authorizer), jwt)
    }

    fn join_restaurant(token: Option<String>) -> ClientEvent {
        ClientEvent::JoinRestaurant(RoomTarget::WithToken {
            id: "r1".into(),
            token,
        })
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("open".parse::<RoomAccessMode>(), Ok(RoomAccessMode::Open));
        assert_eq!("staff_token".parse::<RoomAccessMode>(), Ok(RoomAccessMode::StaffToken));
        assert!("closed".parse::<RoomAccessMode>().is_err());
    }

    #[tokio::test]
    async fn test_open_accepts_anonymous() {
        let event = ClientEvent::JoinRestaurant(RoomTarget::Id("r1".into()));
        assert!(OpenRoomAccess.authorize_join(&event, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_staff_token_rejects_anonymous_restaurant_join() {
        let (access, _) = access();
        assert!(access.authorize_join(&join_restaurant(None), None).await.is_err());

        // Order rooms stay open
        let join_order = ClientEvent::JoinOrder(RoomTarget::Id("o1".into()));
        assert!(access.authorize_join(&join_order, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_staff_token_accepts_owner_token() {
        let (access, jwt) = access();
        let token = jwt.generate_token("owner", "owner", ROLE_STAFF).unwrap();
        assert!(
            access
                .authorize_join(&join_restaurant(Some(token)), None)
                .await
                .is_ok()
        );

        let connection_user = CurrentUser {
            id: "owner".into(),
            username: "owner".into(),
            role: ROLE_STAFF.into(),
        };
        assert!(
            access
                .authorize_join(&join_restaurant(None), Some(&connection_user))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_staff_token_rejects_stranger_and_bad_token() {
        let (access, jwt) = access();
        let token = jwt.generate_token("stranger", "stranger", ROLE_STAFF).unwrap();
        assert!(
            access
                .authorize_join(&join_restaurant(Some(token)), None)
                .await
                .is_err()
        );
        assert!(
            access
                .authorize_join(&join_restaurant(Some("garbage".into())), None)
                .await
                .is_err()
        );
    }
}
