//! Per-task execution: gating, retries and the setup/execute/teardown lifecycle

mod pipeline;
mod task;
