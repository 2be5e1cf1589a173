pub mod coefficient;
pub mod event;
pub mod notification;
pub mod status;

pub use coefficient::{COEFFICIENT_SCALE, Coefficient, CoefficientError};
pub use event::{CreateEventRequest, EventResponse, ListEventsQuery, UpdateEventRequest};
pub use notification::{NotificationDecodeError, StatusChangeNotification};
pub use status::EventStatus;
