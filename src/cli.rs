use montyhall::{
    run, Command, Decision, SimObserver, Simulation, StageChange, StageEvent, Statistics,
    ThreadRngSource, SPEEDS,
};
use std::time::Duration;
use tokio::sync::mpsc::channel;
use tracing::info;

/// 胜率条宽度,沿用原版界面
const BAR_WIDTH: usize = 50;

/// 模拟运行的时长
const RUN_FOR: Duration = Duration::from_secs(10);

/// 每完成一批局数写一行进度日志的观察者
#[derive(Default)]
struct Progress {
    scored: u64,
}

impl SimObserver for Progress {
    fn on_stage(&mut self, event: &StageEvent) {
        if let StageChange::Score { statistics, .. } = event.change {
            self.scored += 1;
            if self.scored % 500 == 0 {
                info!(
                    trials = statistics.switch.selections + statistics.stay.selections,
                    "progress"
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut sim = Simulation::new(ThreadRngSource);
    sim.subscribe(Box::new(Progress::default()));

    let (sender, receiver) = channel(16);
    let handle = tokio::spawn(run(sim, receiver));

    // 提到最高档再启动
    for _ in 1..SPEEDS.len() {
        sender.send(Command::IncreaseSpeed).await?;
    }
    sender.send(Command::ToggleActive).await?;

    tokio::time::sleep(RUN_FOR).await;

    // 暂停并关闭控制端,循环在下一个阶段边界退出
    sender.send(Command::ToggleActive).await?;
    drop(sender);

    let sim = handle.await??;
    let statistics = sim.statistics();

    println!("模拟共进行 {} 局;", statistics.total_trials());
    print_strategy("改变选择", statistics, Decision::Switch);
    print_strategy("坚持选择", statistics, Decision::Stay);
    println!("{}", serde_json::to_string(&statistics.snapshot())?);

    Ok(())
}

/// 按原版界面的样式打印一种策略的计数和胜率条
fn print_strategy(title: &str, statistics: &Statistics, decision: Decision) {
    let (wins, selections) = statistics.counts(decision);
    println!(
        "{title} {selections} 局,赢得奖品 {wins} 局,胜率 {:.2}%;",
        statistics.win_rate(decision) * 100.0
    );
    let filled = statistics.bar(decision, BAR_WIDTH);
    println!("[{}{}]", "X".repeat(filled), " ".repeat(BAR_WIDTH - filled));
}
