//! Repositories over the relational store.
//!
//! Methods taking `&self` run on the shared connection pool. Associated
//! functions suffixed `_on` accept any [`sea_orm::ConnectionTrait`] so the
//! service layer can run them inside its own transaction; they return the raw
//! [`sea_orm::DbErr`] so the caller decides how a failure is reported.

pub mod creator_member;
pub mod guest_conversion;
pub mod invitation;
pub mod user;

pub use creator_member::CreatorMemberRepository;
pub use guest_conversion::GuestConversionRepository;
pub use invitation::InvitationRepository;
pub use user::UserRepository;
