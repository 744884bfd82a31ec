/// 执行报告

use std::fmt;

/// 执行步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    Echo,
    ServerInfo,
    Hello,
    GetTime,
    /// 根方法不可用时通过 hello-world 服务调用 hello
    HelloFallback,
    RegisterService,
    ComputeSquare,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Echo => "echo",
            Self::ServerInfo => "get_server_info",
            Self::Hello => "hello",
            Self::GetTime => "get_time",
            Self::HelloFallback => "hello-world.hello",
            Self::RegisterService => "register_service",
            Self::ComputeSquare => "compute_square",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step: Step,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub connected: bool,
    pub steps: Vec<StepRecord>,
}

impl Report {
    pub fn record(&mut self, step: Step, result: Result<String, String>) {
        let outcome = match result {
            Ok(detail) => Outcome::Passed(detail),
            Err(error) => Outcome::Failed(error),
        };
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn outcome(&self, step: Step) -> Option<&Outcome> {
        self.steps
            .iter()
            .find(|r| r.step == step)
            .map(|r| &r.outcome)
    }

    pub fn attempted(&self, step: Step) -> bool {
        self.outcome(step).is_some()
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
            .count()
    }

    /// 只有连接失败才视为整体失败，可选步骤失败不影响结果
    pub fn success(&self) -> bool {
        self.connected
    }

    pub fn exit_code(&self) -> u8 {
        if self.success() {
            0
        } else {
            1
        }
    }
}
