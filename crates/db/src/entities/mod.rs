//! Database entities.

pub mod creator_member;
pub mod guest_conversion_policy;
pub mod guest_conversion_state;
pub mod invitation;
pub mod user;

pub use creator_member::Entity as CreatorMember;
pub use guest_conversion_policy::Entity as GuestConversionPolicy;
pub use guest_conversion_state::Entity as GuestConversionState;
pub use invitation::Entity as Invitation;
pub use user::Entity as User;
