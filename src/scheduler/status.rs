//! The scheduler lifecycle state machine.

use std::fmt;

use serde::Serialize;

use crate::error::CrawlerError;

/// The scheduler's lifecycle state.
///
/// `Initializing`, `Starting`, and `Stopping` are transitional: the
/// scheduler enters them at the top of the corresponding call and settles
/// into the next state (or falls back to the previous one) before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Uninitialized = 0,
    Initializing = 1,
    Initialized = 2,
    Starting = 3,
    Started = 4,
    Stopping = 5,
    Stopped = 6,
}

impl Status {
    pub(crate) fn from_u8(value: u8) -> Status {
        match value {
            1 => Status::Initializing,
            2 => Status::Initialized,
            3 => Status::Starting,
            4 => Status::Started,
            5 => Status::Stopping,
            6 => Status::Stopped,
            _ => Status::Uninitialized,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Uninitialized => "uninitialized",
            Status::Initializing => "initializing",
            Status::Initialized => "initialized",
            Status::Starting => "starting",
            Status::Started => "started",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        };
        f.write_str(text)
    }
}

/// Checks whether `wanted` may be entered from `current`.
///
/// The rules:
/// 1. No state change may start while the scheduler is in a transitional
///    state.
/// 2. Callers may only target a transitional state; the settled successor is
///    entered internally.
/// 3. From `Uninitialized`, neither `Starting` nor `Stopping` is legal.
/// 4. From `Started`, neither `Initializing` nor `Starting` is legal.
/// 5. `Stopping` is legal only from `Started`.
pub fn check_status(current: Status, wanted: Status) -> Result<(), CrawlerError> {
    match current {
        Status::Initializing => {
            return Err(CrawlerError::scheduler(
                "the scheduler is being initialized!",
            ))
        }
        Status::Starting => return Err(CrawlerError::scheduler("the scheduler is being started!")),
        Status::Stopping => return Err(CrawlerError::scheduler("the scheduler is being stopped!")),
        _ => {}
    }
    if current == Status::Uninitialized
        && (wanted == Status::Starting || wanted == Status::Stopping)
    {
        return Err(CrawlerError::scheduler(
            "the scheduler has not yet been initialized!",
        ));
    }
    match wanted {
        Status::Initializing => {
            if current == Status::Started {
                return Err(CrawlerError::scheduler("the scheduler has been started!"));
            }
        }
        Status::Starting => {
            if current == Status::Uninitialized {
                return Err(CrawlerError::scheduler(
                    "the scheduler has not been initialized!",
                ));
            }
            if current == Status::Started {
                return Err(CrawlerError::scheduler("the scheduler has been started!"));
            }
        }
        Status::Stopping => {
            if current != Status::Started {
                return Err(CrawlerError::scheduler(
                    "the scheduler has not been started!",
                ));
            }
        }
        _ => {
            return Err(CrawlerError::scheduler(format!(
                "unsupported wanted status for check! (wantedStatus: {})",
                wanted as u8
            )));
        }
    }
    Ok(())
}
