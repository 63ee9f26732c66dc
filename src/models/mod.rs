mod form;
mod ids;
mod user;

pub use form::{RegistrationForm, RegistrationRequest};
pub use ids::{ScheduleId, UserId, SCHEDULE_ID_LEN};
pub use user::{MemberRole, Members, UserRecord, UserType};
