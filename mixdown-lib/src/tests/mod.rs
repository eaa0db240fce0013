//! Orchestration tests
//!
//! Scenario tests for the compositor, driven by scripted collaborators:
//! - placement and clipping scenarios
//! - partial and total probe failures
//! - probe and render time limits
