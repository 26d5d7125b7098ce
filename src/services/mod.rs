// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod assignment;
pub mod dashboard;
pub mod detail;
pub mod lifecycle;
pub mod notify;
pub mod projection;
pub mod receipt;
pub mod session;
pub mod storage;

pub use assignment::AssignmentCoordinator;
pub use dashboard::{DashboardService, DashboardSession, SessionUpdate};
pub use lifecycle::{CompletionProof, LifecycleEngine, Transition, TransitionOutcome};
pub use notify::{LogNotifier, NotificationDispatcher, Notifier, NotifyError, SmsGateway};
pub use projection::{DashboardKind, DashboardState, DashboardView, Toast};
pub use session::{Actor, UserContext};
pub use storage::{LocalObjectStorage, ObjectStorage};
