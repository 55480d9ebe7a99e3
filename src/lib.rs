//! # wiki-migrate
//!
//! Migrates a legacy relational wiki store (documents, revisions, users)
//! into a file-based content corpus.
//!
//! For every locale the migration produces a `_wikihistory.json` (slug →
//! last modification and contributors), a `_redirects.txt` with every
//! redirect resolved to its final destination, and translation metadata
//! for translated locales. Documents in archived sections are left out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌────────────┐   ┌──────────┐
//! │   Source    │──▶│ MigrationContext │──▶│  Governor  │──▶│  Output  │
//! │ SQLite/Mem  │   │ redirects+archive│   │ process_row│   │ per-locale│
//! └─────────────┘   └──────────────────┘   └────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Redirect target and locale normalization |
//! | [`fundamental`] | Fixed rewrites for relocated legacy sections |
//! | [`archive`] | Archive prefixes and classification |
//! | [`redirects`] | Redirect graph construction and resolution |
//! | [`contributors`] | Document creators and usernames |
//! | [`contributions`] | Per-revision contributions CSV |
//! | [`history`] | Per-locale history aggregation |
//! | [`governor`] | Bounded, fail-fast fan-out |
//! | [`source`] | Document source abstraction (SQLite, in-memory) |
//! | [`context`] | Read-only state shared by a run |
//! | [`pipeline`] | Per-document work and run orchestration |
//! | [`output`] | Per-locale file writers |
//! | [`stats`] | Document counts |
//! | [`db`] | Database connection |
//! | [`schema`] | Legacy schema creation |

pub mod archive;
pub mod config;
pub mod context;
pub mod contributions;
pub mod contributors;
pub mod db;
pub mod error;
pub mod fundamental;
pub mod governor;
pub mod history;
pub mod models;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod redirects;
pub mod schema;
pub mod source;
pub mod stats;
