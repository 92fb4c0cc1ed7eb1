pub mod event;
pub mod money;
pub mod smart_split;
pub mod split;
pub mod summary;
pub mod validation;

pub use event::{Activity, BillItem, ConsumedItem, ConsumptionDetail, Event, EventParticipant, Settlement};
pub use money::Money;
pub use smart_split::{consumption_details, smart_split};
pub use split::{split_equal, validate_split_total, Participant, SplitCheck};
pub use summary::{calculate_summary, Balance, Summary};
pub use validation::{
    confirm_password_error, is_safe_input, is_valid_email, password_error, PasswordError,
};
