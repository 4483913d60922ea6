pub mod attendance_poller;
pub mod class_builder;
pub mod profile;
pub mod qr_session;
pub mod reports;
pub mod scheduler;
pub mod session_clock;
pub mod slot_validator;

pub use class_builder::{BatchOutcome, ClassDraft, create_classes};
pub use qr_session::{Location, QrSessionController, SessionSettings, SessionSnapshot};
pub use scheduler::{SharedClock, WallClock};
pub use slot_validator::{
    OccupiedSlot, SlotMode, SlotSelection, SlotToggle, is_slot_occupied, occupied_slot_info,
};
