//! # BNPL Engine
//!
//! A streaming processor for buy-now-pay-later plan operations: customer
//! enrollment, plan creation with installment schedules, installment
//! payments, overdue detection and merchant dashboard metrics.
//!
//! ## Design Principles
//!
//! - **Integer cent arithmetic**: amounts are split in whole cents, so
//!   installments always sum back to the exact total
//! - **Streaming processing**: memory-efficient CSV processing, bad rows
//!   are skipped with a warning
//! - **Deterministic output**: no clock reads; reference dates are inputs,
//!   and output is sorted by plan ID and sequence
//!
//! ## Example
//!
//! ```no_run
//! use bnpl_engine::PlanEngine;
//! use std::io::Cursor;
//!
//! let csv = "op,plan,merchant,customer,name,total,count,period,seq,score,date\n\
//!            enroll,,,20,,,,,,700,\n";
//! let mut engine = PlanEngine::new();
//! engine.process_csv(Cursor::new(csv)).unwrap();
//! engine.write_output(std::io::stdout()).unwrap();
//! ```

pub mod customer;
pub mod engine;
pub mod error;
pub mod money;
pub mod plan;
pub mod record;
pub mod schedule;

pub use customer::{CustomerProfile, ScoreStatus};
pub use engine::{InstallmentRef, MerchantDashboard, PlanEngine, REMINDER_LEAD_DAYS};
pub use error::{EngineError, PayError, Result};
pub use money::Money;
pub use plan::{Installment, InstallmentFilter, InstallmentStatus, Plan, PlanStatus};
pub use record::{OpRecord, Operation};
pub use schedule::{preview_installments, InstallmentPreview};
