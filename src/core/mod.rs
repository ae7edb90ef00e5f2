//! # Core Application Logic
//!
//! Screen logic for BookHaven. It knows nothing about any specific UI
//! technology; views talk to it only through coordinators.
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │            CORE             │
//!                    │        (this module)        │
//!                    │                             │
//!                    │  • BookList   (list screen) │
//!                    │  • BookDetail (form screen) │
//!                    │  • Coordinator loop         │
//!                    │  • StateStore / Effects     │
//!                    └──────────────┬──────────────┘
//!                                   │ UseCases
//!                                   ▼
//!                    ┌─────────────────────────────┐
//!                    │  catalog (BookRepository)   │
//!                    └─────────────────────────────┘
//!
//!     view ── submit(Action) ──▶ Coordinator ──▶ state() / effects() ──▶ view
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the serialized reducer loop every screen runs on
//! - [`store`]: latest-value state store and acknowledge-to-reset effect slot
//! - [`list`]: load, sort, search and delete for the book list
//! - [`detail`]: load, validate, save and delete for a single book
//! - [`config`]: TOML configuration with env and CLI overrides

pub mod config;
pub mod coordinator;
pub mod detail;
pub mod list;
pub mod store;

pub use coordinator::{Coordinator, Reducer, SubmitError};
pub use detail::{BookDetail, DetailAction, DetailCoordinator, DetailEffect, DetailViewState};
pub use list::{BookList, ListAction, ListCoordinator, ListEffect, ListViewState};
pub use store::{EffectChannel, StateStore};
