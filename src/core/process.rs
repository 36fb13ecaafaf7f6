//! 状态机进程引擎
//!
//! 调度抽象：每个后台进程是一台被轮询的状态机，显式持有当前状态，
//! 把"决策"（评估转移条件并改写状态）与"动作"（执行刚进入状态的
//! 副作用）分开。动作只在转移发生后执行，转移一律留下日志，因此
//! 不会有转移悄悄丢掉副作用，也不会有动作在没有记录的情况下运行。

use async_trait::async_trait;
use tracing::info;

/// 被轮询的状态机进程
///
/// 外层调度器每拍调用一次 `execute`；各进程在 `execute` 里先检查
/// 运行状态门是否允许自己推进（通常是 IDLE 或自己的忙值），再调用
/// [`update_state_machine`] 走决策 / 动作两步。
#[async_trait]
pub trait StateMachineProcess: Send {
    /// 进程名，日志与状态上报用
    fn name(&self) -> &'static str;

    /// 当前状态名
    fn current_state(&self) -> &'static str;

    /// 决策步：评估转移条件，必要时改写自身状态，返回是否发生转移
    async fn evaluate_transitions(&mut self) -> bool;

    /// 动作步：执行刚进入状态的副作用
    async fn run_state_action(&mut self);

    /// 轮询入口，由外层调度器按固定顺序逐拍调用
    async fn execute(&mut self);
}

/// 推进一台状态机：快照旧状态，决策，转移发生才记日志并执行动作
pub async fn update_state_machine<P>(process: &mut P)
where
    P: StateMachineProcess + ?Sized,
{
    let old = process.current_state();
    if process.evaluate_transitions().await {
        info!(
            process = process.name(),
            "state_changed: {} -> {}",
            old,
            process.current_state()
        );
        process.run_state_action().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 脚本化状态机：按预置剧本依次转移，动作计数
    struct ScriptedProcess {
        states: Vec<&'static str>,
        cursor: usize,
        script: Vec<bool>,
        step: usize,
        actions_run: Vec<&'static str>,
    }

    impl ScriptedProcess {
        fn new(script: Vec<bool>) -> Self {
            Self {
                states: vec!["A", "B", "C", "D"],
                cursor: 0,
                script,
                step: 0,
                actions_run: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl StateMachineProcess for ScriptedProcess {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn current_state(&self) -> &'static str {
            self.states[self.cursor]
        }

        async fn evaluate_transitions(&mut self) -> bool {
            let fired = self.script.get(self.step).copied().unwrap_or(false);
            self.step += 1;
            if fired {
                self.cursor += 1;
            }
            fired
        }

        async fn run_state_action(&mut self) {
            self.actions_run.push(self.states[self.cursor]);
        }

        async fn execute(&mut self) {
            update_state_machine(self).await;
        }
    }

    #[tokio::test]
    async fn test_action_runs_only_after_transition() {
        let mut process = ScriptedProcess::new(vec![false, true, false, true]);

        process.execute().await;
        assert_eq!(process.current_state(), "A");
        assert!(process.actions_run.is_empty());

        process.execute().await;
        assert_eq!(process.current_state(), "B");
        assert_eq!(process.actions_run, vec!["B"]);

        process.execute().await;
        assert_eq!(process.actions_run, vec!["B"]);

        process.execute().await;
        assert_eq!(process.current_state(), "C");
        assert_eq!(process.actions_run, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_action_sees_post_transition_state() {
        // 动作步观察到的必须是转移后的新状态
        let mut process = ScriptedProcess::new(vec![true]);
        process.execute().await;
        assert_eq!(process.actions_run, vec!["B"]);
    }
}
