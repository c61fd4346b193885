use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Progress of an order from the kitchen's point of view.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order is already {0}")]
    Terminal(OrderStatus),
    #[error("cannot move order from {from} to {to}")]
    Unsupported { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown order status `{0}`")]
pub struct ParseStatusError(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses reachable from `self` in one step.
    pub fn next_steps(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::Ready, OrderStatus::Cancelled],
            OrderStatus::Ready => &[OrderStatus::Completed],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_steps().contains(&next)
    }

    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal(self));
        }
        if !self.can_transition_to(next) {
            return Err(TransitionError::Unsupported {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// The order lists the staff screens work from.
#[derive(Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderQueue {
    /// Tickets still to be cooked, oldest first.
    Kitchen,
    /// Everything but cancelled orders, newest first.
    Waiter,
    Active,
    History,
    #[default]
    All,
}

impl OrderQueue {
    pub fn statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderQueue::Kitchen => &[OrderStatus::Pending, OrderStatus::Preparing],
            OrderQueue::Waiter => &[
                OrderStatus::Pending,
                OrderStatus::Preparing,
                OrderStatus::Ready,
                OrderStatus::Completed,
            ],
            OrderQueue::Active => &[
                OrderStatus::Pending,
                OrderStatus::Preparing,
                OrderStatus::Ready,
            ],
            OrderQueue::History => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderQueue::All => &OrderStatus::ALL,
        }
    }

    pub fn includes(&self, status: OrderStatus) -> bool {
        self.statuses().contains(&status)
    }

    /// Kitchen works the queue front to back; every other screen shows the
    /// latest orders first.
    pub fn oldest_first(&self) -> bool {
        matches!(self, OrderQueue::Kitchen)
    }
}

/// Splits orders into (active, history).
pub fn partition_active<T, F>(orders: Vec<T>, status_of: F) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> OrderStatus,
{
    orders
        .into_iter()
        .partition(|o| OrderQueue::Active.includes(status_of(o)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let status = OrderStatus::Pending
            .transition(OrderStatus::Preparing)
            .and_then(|s| s.transition(OrderStatus::Ready))
            .and_then(|s| s.transition(OrderStatus::Completed));
        assert_eq!(status, Ok(OrderStatus::Completed));
    }

    #[test]
    fn test_cancel_from_pending_and_preparing() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Cancelled),
            Ok(OrderStatus::Cancelled)
        );
        assert_eq!(
            OrderStatus::Preparing.transition(OrderStatus::Cancelled),
            Ok(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_ready_cannot_be_cancelled() {
        assert_eq!(
            OrderStatus::Ready.transition(OrderStatus::Cancelled),
            Err(TransitionError::Unsupported {
                from: OrderStatus::Ready,
                to: OrderStatus::Cancelled,
            })
        );
    }

    #[test]
    fn test_terminal_statuses_never_change() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for next in OrderStatus::ALL {
                assert_eq!(
                    terminal.transition(next),
                    Err(TransitionError::Terminal(terminal))
                );
            }
        }
    }

    #[test]
    fn test_same_status_is_rejected() {
        assert!(OrderStatus::Pending.transition(OrderStatus::Pending).is_err());
        assert!(OrderStatus::Ready.transition(OrderStatus::Ready).is_err());
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        assert!(OrderStatus::Pending.transition(OrderStatus::Ready).is_err());
        assert!(OrderStatus::Pending
            .transition(OrderStatus::Completed)
            .is_err());
        assert!(OrderStatus::Preparing
            .transition(OrderStatus::Pending)
            .is_err());
    }

    #[test]
    fn test_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        assert!("served".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_active_and_history_partition_all() {
        for status in OrderStatus::ALL {
            let active = OrderQueue::Active.includes(status);
            let history = OrderQueue::History.includes(status);
            assert!(active ^ history, "{status} must be in exactly one queue");
        }
    }

    #[test]
    fn test_partition_active_keeps_every_order() {
        let orders = vec![
            (1, OrderStatus::Pending),
            (2, OrderStatus::Completed),
            (3, OrderStatus::Ready),
            (4, OrderStatus::Cancelled),
            (5, OrderStatus::Preparing),
        ];
        let (active, history) = partition_active(orders, |o| o.1);
        let active_ids: Vec<_> = active.iter().map(|o| o.0).collect();
        let history_ids: Vec<_> = history.iter().map(|o| o.0).collect();
        assert_eq!(active_ids, vec![1, 3, 5]);
        assert_eq!(history_ids, vec![2, 4]);
    }

    #[test]
    fn test_kitchen_and_waiter_queues() {
        assert!(OrderQueue::Kitchen.includes(OrderStatus::Pending));
        assert!(OrderQueue::Kitchen.includes(OrderStatus::Preparing));
        assert!(!OrderQueue::Kitchen.includes(OrderStatus::Ready));
        assert!(OrderQueue::Kitchen.oldest_first());

        assert!(!OrderQueue::Waiter.includes(OrderStatus::Cancelled));
        assert!(OrderQueue::Waiter.includes(OrderStatus::Completed));
        assert!(!OrderQueue::Waiter.oldest_first());
    }
}
