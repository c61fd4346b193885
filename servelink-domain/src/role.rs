use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::OrderStatus;

#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Owner,
    Kitchen,
    Waiter,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown staff role `{0}`")]
pub struct ParseRoleError(pub String);

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Owner => "owner",
            StaffRole::Kitchen => "kitchen",
            StaffRole::Waiter => "waiter",
        }
    }

    /// Screen a signed-in user lands on.
    pub fn home_path(&self) -> &'static str {
        match self {
            StaffRole::Owner => "/dashboard",
            StaffRole::Kitchen => "/kitchen",
            StaffRole::Waiter => "/waiter",
        }
    }

    pub fn manages_restaurant(&self) -> bool {
        matches!(self, StaffRole::Owner)
    }

    /// Kitchen staff cook and cancel, waiters serve, owners do either.
    pub fn may_set_status(&self, next: OrderStatus) -> bool {
        match self {
            StaffRole::Owner => true,
            StaffRole::Kitchen => matches!(
                next,
                OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::Cancelled
            ),
            StaffRole::Waiter => matches!(next, OrderStatus::Completed),
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(StaffRole::Owner),
            "kitchen" => Ok(StaffRole::Kitchen),
            "waiter" => Ok(StaffRole::Waiter),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_paths() {
        assert_eq!(StaffRole::Owner.home_path(), "/dashboard");
        assert_eq!(StaffRole::Kitchen.home_path(), "/kitchen");
        assert_eq!(StaffRole::Waiter.home_path(), "/waiter");
    }

    #[test]
    fn test_status_permissions() {
        assert!(StaffRole::Kitchen.may_set_status(OrderStatus::Preparing));
        assert!(StaffRole::Kitchen.may_set_status(OrderStatus::Cancelled));
        assert!(!StaffRole::Kitchen.may_set_status(OrderStatus::Completed));

        assert!(StaffRole::Waiter.may_set_status(OrderStatus::Completed));
        assert!(!StaffRole::Waiter.may_set_status(OrderStatus::Ready));

        for status in OrderStatus::ALL {
            assert!(StaffRole::Owner.may_set_status(status));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("waiter".parse::<StaffRole>(), Ok(StaffRole::Waiter));
        assert!("chef".parse::<StaffRole>().is_err());
    }
}
