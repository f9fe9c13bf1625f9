//! Business logic services.

#![allow(missing_docs)]

pub mod creator_member;
pub mod guest_conversion;
pub mod invitation;

pub use creator_member::CreatorMemberService;
pub use guest_conversion::{
    ConversionPolicy, ConversionStats, GuestConversionService, GuestEvent, PromptContent,
    PromptType, TrackEventResult, default_prompt_content, evaluate_prompt,
};
pub use invitation::{
    AcceptInvitationError, AcceptInvitationResponse, CreateInvitationInput, InvitationService,
    InvitationView,
};
