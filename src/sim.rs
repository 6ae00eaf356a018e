use crate::{
    Decision, Door, RandomSource, Result, SpeedController, Stage, Statistics, StatsSnapshot,
    TrialEngine, TrialOutcome, DOOR_COUNT,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info};

/// 一次阶段推进带来的变化
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
#[serde(tag = "stage")]
pub enum StageChange {
    /// 新的一局就位
    Setup {
        /// 奖品所在门序号
        winning: u32,
    },

    /// 玩家已选择
    Selection {
        /// 玩家选中的门序号
        selected: u32,
    },

    /// 主持人已揭示
    Reveal {
        /// 主持人揭示的门序号
        revealed: u32,
    },

    /// 玩家已抉择
    Decision {
        /// 玩家的抉择
        decision: Decision,

        /// 抉择后玩家坚守的门序号
        final_door: u32,
    },

    /// 本局已计分
    Score {
        /// 本局结果
        outcome: TrialOutcome,

        /// 计分后的统计快照
        statistics: StatsSnapshot,
    },
}

/// 每个阶段完成后发给观察者的事件
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct StageEvent {
    /// 推进后三扇门的状态
    pub doors: [Door; DOOR_COUNT as usize],

    /// 本次推进的变化
    pub change: StageChange,
}

/// 阶段推进的观察者
///
/// 统计面板、门面板、状态栏等各自注册一个,彼此独立
pub trait SimObserver {
    /// 每个阶段完成后调用一次
    fn on_stage(&mut self, _event: &StageEvent) {}
}

/// 什么都不做的观察者
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// 操作者可下达的控制指令
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(tag = "action")]
pub enum Command {
    /// 启停模拟
    ToggleActive,

    /// 升一档速度
    IncreaseSpeed,

    /// 降一档速度
    DecreaseSpeed,

    /// 统计清零
    ClearStatistics,
}

/// 模拟整体:状态机、统计、速度档位与观察者
///
/// 局内状态只由模拟循环这一个写者改动;操作者只通过 [`Command`] 影响
/// 启停标志、速度档位和统计清零
pub struct Simulation<R: RandomSource> {
    engine: TrialEngine,
    statistics: Statistics,
    speed: SpeedController,
    active: bool,
    rng: R,
    observers: Vec<Box<dyn SimObserver + Send>>,
}

impl<R: RandomSource> Simulation<R> {
    pub fn new(rng: R) -> Self {
        Self {
            engine: TrialEngine::new(),
            statistics: Statistics::new(),
            speed: SpeedController::new(),
            active: false,
            rng,
            observers: Vec::new(),
        }
    }

    /// 注册一个观察者,此后每个阶段完成都会收到事件
    pub fn subscribe(&mut self, observer: Box<dyn SimObserver + Send>) {
        self.observers.push(observer);
    }

    /// 模拟是否在运行
    pub fn active(&self) -> bool {
        self.active
    }

    /// 三扇门的当前状态
    pub fn doors(&self) -> &[Door; DOOR_COUNT as usize] {
        self.engine.doors()
    }

    /// 当前阶段
    pub fn stage(&self) -> &Stage {
        self.engine.stage()
    }

    /// 当前速度倍率
    pub fn current_rate(&self) -> f64 {
        self.speed.current_rate()
    }

    /// 当前阶段边界之间的延时
    pub fn stage_delay(&self) -> Duration {
        self.speed.stage_delay()
    }

    /// 胜负统计
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// 启停模拟;从一局中途暂停后恢复时丢弃旧的一局
    pub fn toggle_active(&mut self) -> bool {
        self.active = !self.active;
        if self.active && self.engine.stage().is_mid_trial() {
            self.engine.reset();
        }
        info!(active = self.active, "simulation toggled");
        self.active
    }

    /// 升一档速度
    pub fn increase_speed(&mut self) {
        self.speed.increase();
        info!(rate = self.speed.current_rate(), "speed changed");
    }

    /// 降一档速度
    pub fn decrease_speed(&mut self) {
        self.speed.decrease();
        info!(rate = self.speed.current_rate(), "speed changed");
    }

    /// 两种策略的统计一并清零
    pub fn clear_statistics(&mut self) {
        self.statistics.clear();
        info!("statistics cleared");
    }

    /// 应用一条控制指令
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::ToggleActive => {
                self.toggle_active();
            }
            Command::IncreaseSpeed => self.increase_speed(),
            Command::DecreaseSpeed => self.decrease_speed(),
            Command::ClearStatistics => self.clear_statistics(),
        }
    }

    /// 推进一个阶段并通知全部观察者
    ///
    /// 一局计分后的下一次推进自动开始新的一局
    pub fn advance(&mut self) -> Result<()> {
        let change = match *self.engine.stage() {
            Stage::Idle | Stage::Scored { .. } => {
                let winning = self.engine.setup(&mut self.rng)?;
                StageChange::Setup { winning }
            }
            Stage::Setup { .. } => {
                let selected = self.engine.select(&mut self.rng)?;
                StageChange::Selection { selected }
            }
            Stage::Selected { .. } => {
                let revealed = self.engine.reveal(&mut self.rng)?;
                StageChange::Reveal { revealed }
            }
            Stage::Revealed { .. } => {
                let (decision, final_door) = self.engine.decide(&mut self.rng)?;
                StageChange::Decision {
                    decision,
                    final_door,
                }
            }
            Stage::Decided { .. } => {
                let outcome = self.engine.score(&mut self.statistics)?;
                debug!(win = outcome.win(), "{}", outcome.summary());
                StageChange::Score {
                    outcome,
                    statistics: self.statistics.snapshot(),
                }
            }
        };

        let event = StageEvent {
            doors: *self.engine.doors(),
            change,
        };
        for observer in &mut self.observers {
            observer.on_stage(&event);
        }
        Ok(())
    }
}

/// 协作式调度循环
///
/// 暂停时挂起等待指令,不消耗随机数也不碰统计;运行时逐阶段推进,
/// 每个阶段边界挂起一个阶段延时,Decision 与 Score 共用一个边界。
/// 指令只在阶段边界生效,进行中的阶段总是先完成,观察者看不到撕裂
/// 的局内状态。控制端全部关闭后循环退出并交还模拟本体。
pub async fn run<R: RandomSource>(
    mut sim: Simulation<R>,
    mut commands: Receiver<Command>,
) -> Result<Simulation<R>> {
    loop {
        if !sim.active() {
            match commands.recv().await {
                Some(command) => sim.apply(command),
                None => return Ok(sim),
            }
            continue;
        }

        sim.advance()?;
        if matches!(sim.stage(), Stage::Decided { .. }) {
            // 抉择和计分之间不挂起
            sim.advance()?;
        }

        let sleep = tokio::time::sleep(sim.stage_delay());
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    Some(command) => {
                        sim.apply(command);
                        if !sim.active() {
                            break;
                        }
                    }
                    None => return Ok(sim),
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ThreadRngSource;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::channel;

    /// 把收到的事件全部存下来的观察者
    #[derive(Default, Clone)]
    struct Recorder {
        events: Arc<Mutex<Vec<StageEvent>>>,
    }

    impl SimObserver for Recorder {
        fn on_stage(&mut self, event: &StageEvent) {
            self.events.lock().unwrap().push(*event);
        }
    }

    fn order_index(change: &StageChange) -> usize {
        match change {
            StageChange::Setup { .. } => 0,
            StageChange::Selection { .. } => 1,
            StageChange::Reveal { .. } => 2,
            StageChange::Decision { .. } => 3,
            StageChange::Score { .. } => 4,
        }
    }

    #[test]
    fn full_trial_takes_five_advances() {
        let mut sim = Simulation::new(ThreadRngSource);
        for _ in 0..5 {
            sim.advance().unwrap();
        }
        assert!(sim.stage().is_scored());
        assert_eq!(sim.statistics().total_trials(), 1);

        // 计分后的下一次推进自动开始新的一局
        sim.advance().unwrap();
        assert!(matches!(sim.stage(), Stage::Setup { .. }));
    }

    #[test]
    fn resume_after_pause_restarts_at_setup() {
        let mut sim = Simulation::new(ThreadRngSource);
        sim.toggle_active();
        sim.advance().unwrap();
        sim.advance().unwrap();
        sim.advance().unwrap();
        assert!(sim.stage().is_mid_trial());

        sim.apply(Command::ToggleActive);
        assert!(!sim.active());
        sim.apply(Command::ToggleActive);

        // 恢复时丢弃未完成的一局,从全新的 Setup 开始
        assert!(matches!(sim.stage(), Stage::Idle));
        sim.advance().unwrap();
        assert!(matches!(sim.stage(), Stage::Setup { .. }));
    }

    #[test]
    fn clear_statistics_command_is_idempotent() {
        let mut sim = Simulation::new(ThreadRngSource);
        for _ in 0..5 {
            sim.advance().unwrap();
        }
        assert_eq!(sim.statistics().total_trials(), 1);

        sim.apply(Command::ClearStatistics);
        assert_eq!(sim.statistics().snapshot(), StatsSnapshot::default());
        sim.apply(Command::ClearStatistics);
        assert_eq!(sim.statistics().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn speed_commands_change_the_delay() {
        let mut sim = Simulation::new(ThreadRngSource);
        let before = sim.stage_delay();
        sim.apply(Command::IncreaseSpeed);
        assert!(sim.stage_delay() < before);
        sim.apply(Command::DecreaseSpeed);
        assert_eq!(sim.stage_delay(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_loop_emits_nothing() {
        let recorder = Recorder::default();
        let mut sim = Simulation::new(ThreadRngSource);
        sim.subscribe(Box::new(recorder.clone()));

        let (sender, receiver) = channel(16);
        let handle = tokio::spawn(run(sim, receiver));

        // 调速不会让暂停中的循环动起来
        sender.send(Command::IncreaseSpeed).await.unwrap();
        sender.send(Command::DecreaseSpeed).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(sender);

        let sim = handle.await.unwrap().unwrap();
        assert!(!sim.active());
        assert!(matches!(sim.stage(), Stage::Idle));
        assert_eq!(sim.statistics().total_trials(), 0);
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn events_follow_stage_order_and_pause_is_clean() {
        let recorder = Recorder::default();
        let mut sim = Simulation::new(ThreadRngSource);
        sim.subscribe(Box::new(recorder.clone()));
        sim.subscribe(Box::new(NoopObserver));

        let (sender, receiver) = channel(16);
        let handle = tokio::spawn(run(sim, receiver));

        // 默认档位下每个阶段边界挂起 1 秒
        sender.send(Command::ToggleActive).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        sender.send(Command::ToggleActive).await.unwrap();

        // 暂停生效后不再有任何事件,进行中的阶段最多再完成一个
        tokio::time::sleep(Duration::from_secs(5)).await;
        let frozen = recorder.events.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(recorder.events.lock().unwrap().len(), frozen);

        drop(sender);
        let sim = handle.await.unwrap().unwrap();
        assert!(!sim.active());

        let events = recorder.events.lock().unwrap();
        assert!(!events.is_empty());
        assert!(matches!(events[0].change, StageChange::Setup { .. }));

        // 中途没有恢复过,事件必须按阶段次序成环推进
        for pair in events.windows(2) {
            let previous = order_index(&pair[0].change);
            let next = order_index(&pair[1].change);
            assert_eq!(next, (previous + 1) % 5);
        }

        let mut scored = 0;
        for event in events.iter() {
            // 任何阶段边界上都恰有一扇门藏着奖品
            assert_eq!(event.doors.iter().filter(|door| door.is_winner()).count(), 1);
            match event.change {
                StageChange::Reveal { revealed } => {
                    let door = &event.doors[(revealed - 1) as usize];
                    assert!(door.is_revealed());
                    assert!(!door.is_winner());
                    assert!(!door.is_selected());
                }
                StageChange::Score { outcome, statistics } => {
                    scored += 1;
                    assert_ne!(outcome.final_door(), outcome.revealed());
                    assert!(statistics.switch.wins <= statistics.switch.selections);
                    assert!(statistics.stay.wins <= statistics.stay.selections);
                }
                _ => {}
            }
        }
        assert_eq!(scored, sim.statistics().total_trials());
    }
}
