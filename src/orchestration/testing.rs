//! Recording fakes for the toolchain seams

use crate::error::{PackError, PackResult};
use crate::orchestration::{CommandRunner, Invocation, ToolchainProvisioner, ToolchainStep};
use async_trait::async_trait;
use std::sync::Mutex;

/// Provisioner that records calls and can fail at one step
#[derive(Default)]
pub struct FakeProvisioner {
    pub fail_at: Option<ToolchainStep>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvisioner {
    pub fn failing_at(step: ToolchainStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, step: ToolchainStep, call: String) -> PackResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(step) {
            return Err(PackError::command_exec(step.to_string(), "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolchainProvisioner for FakeProvisioner {
    async fn ensure_daemon_ready(&self) -> PackResult<()> {
        self.record(ToolchainStep::Daemon, "daemon".to_string())
    }

    async fn ensure_hypervisor_ready(&self) -> PackResult<()> {
        self.record(ToolchainStep::Hypervisor, "hypervisor".to_string())
    }

    async fn ensure_tool_installed(&self, channel: &str, revision: &str) -> PackResult<()> {
        self.record(
            ToolchainStep::PackagingTool,
            format!("tool({},{})", channel, revision),
        )
    }

    fn provisioner_name(&self) -> &'static str {
        "fake"
    }
}

/// Runner that records invocations and returns a fixed exit code
#[derive(Default)]
pub struct FakeRunner {
    pub exit_code: i32,
    pub invocations: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn exiting_with(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> PackResult<i32> {
        self.invocations.lock().unwrap().push(invocation.clone());
        Ok(self.exit_code)
    }
}
