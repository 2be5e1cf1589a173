//! Status transition detection.

use lineprov_sdk::objects::EventStatus;

/// Whether moving from `previous` to `candidate` is a notifiable transition.
///
/// `previous` must be the status captured from the store before the update
/// was merged. Transitions are not assumed to be monotone: any change counts,
/// and an unchanged status (repeated or coefficient-only updates) never does.
pub fn detect(previous: EventStatus, candidate: EventStatus) -> bool {
    previous != candidate
}
