mod error;
mod sim;

pub use error::*;
pub use sim::*;

use rand::distributions::Standard;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 门数固定为 3
pub const DOOR_COUNT: u32 = 3;

/// 玩家的最终策略
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
pub enum Decision {
    /// 改变选择
    Switch,

    /// 坚持选择
    Stay,
}

impl Distribution<Decision> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Decision {
        if rng.gen() {
            Decision::Switch
        } else {
            Decision::Stay
        }
    }
}

/// 最终抉择在门上留下的标记
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
pub enum SwitchStatus {
    /// 尚未抉择
    None,

    /// 改选到此门
    SwitchedTo,

    /// 坚持此门
    Stayed,
}

impl Default for SwitchStatus {
    fn default() -> Self {
        Self::None
    }
}

/// 一扇门
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct Door {
    /// 门序号,从 1 开始,创建后不变
    index: u32,

    /// 奖品是否在此门后
    is_winner: bool,

    /// 玩家是否选中此门
    is_selected: bool,

    /// 主持人是否已揭示此门
    is_revealed: bool,

    /// 最终抉择对此门的标记
    switch_status: SwitchStatus,
}

impl Door {
    fn new(index: u32) -> Self {
        Self {
            index,
            is_winner: false,
            is_selected: false,
            is_revealed: false,
            switch_status: SwitchStatus::None,
        }
    }

    /// 每局开始时清空全部标记
    fn clear(&mut self) {
        self.is_winner = false;
        self.is_selected = false;
        self.is_revealed = false;
        self.switch_status = SwitchStatus::None;
    }

    /// 门序号
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 奖品是否在此门后
    pub fn is_winner(&self) -> bool {
        self.is_winner
    }

    /// 玩家是否选中此门
    pub fn is_selected(&self) -> bool {
        self.is_selected
    }

    /// 主持人是否已揭示此门
    pub fn is_revealed(&self) -> bool {
        self.is_revealed
    }

    /// 最终抉择对此门的标记
    pub fn switch_status(&self) -> SwitchStatus {
        self.switch_status
    }
}

/// 一局游戏的各个阶段
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub enum Stage {
    /// 等待新的一局
    Idle,

    /// 奖品已就位
    Setup {
        /// 奖品所在门序号
        winning: u32,
    },

    /// 玩家已选择
    Selected {
        /// 奖品所在门序号
        winning: u32,

        /// 玩家选中的门序号
        selected: u32,
    },

    /// 主持人已揭示
    Revealed {
        /// 奖品所在门序号
        winning: u32,

        /// 玩家选中的门序号
        selected: u32,

        /// 主持人揭示的门序号
        revealed: u32,
    },

    /// 玩家已做出最终抉择
    Decided {
        /// 奖品所在门序号
        winning: u32,

        /// 玩家最初选中的门序号
        selected: u32,

        /// 主持人揭示的门序号
        revealed: u32,

        /// 玩家的抉择
        decision: Decision,

        /// 抉择后玩家坚守的门序号
        final_door: u32,
    },

    /// 本局已计分
    Scored {
        /// 本局结果
        outcome: TrialOutcome,
    },
}

impl Default for Stage {
    fn default() -> Self {
        Self::Idle
    }
}

impl Stage {
    pub fn is_scored(&self) -> bool {
        matches!(self, Stage::Scored { .. })
    }

    /// 是否处于一局中途,暂停后从这种状态恢复需要重新开局
    pub fn is_mid_trial(&self) -> bool {
        matches!(
            self,
            Stage::Setup { .. }
                | Stage::Selected { .. }
                | Stage::Revealed { .. }
                | Stage::Decided { .. }
        )
    }
}

/// 一局游戏的结果
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct TrialOutcome {
    /// 奖品所在门序号
    winning: u32,

    /// 玩家最初选中的门序号
    selected: u32,

    /// 主持人揭示的门序号
    revealed: u32,

    /// 抉择后玩家坚守的门序号
    final_door: u32,

    /// 玩家的抉择
    decision: Decision,

    /// 是否赢得奖品
    win: bool,
}

impl TrialOutcome {
    /// 奖品所在门序号
    pub fn winning(&self) -> u32 {
        self.winning
    }

    /// 玩家最初选中的门序号
    pub fn selected(&self) -> u32 {
        self.selected
    }

    /// 主持人揭示的门序号
    pub fn revealed(&self) -> u32 {
        self.revealed
    }

    /// 抉择后玩家坚守的门序号
    pub fn final_door(&self) -> u32 {
        self.final_door
    }

    /// 玩家的抉择
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// 是否赢得奖品
    pub fn win(&self) -> bool {
        self.win
    }

    /// 本局结果的一句话描述
    pub fn summary(&self) -> &'static str {
        match (self.decision, self.win) {
            (Decision::Switch, true) => "Switching doors led to a win.",
            (Decision::Switch, false) => "Switching doors led to a loss.",
            (Decision::Stay, true) => "Staying with chosen door led to a win.",
            (Decision::Stay, false) => "Staying with chosen door led to a loss.",
        }
    }
}

/// 引擎所需的全部随机抽取,测试时可以换成既定序列
pub trait RandomSource {
    /// 在 [1, 3] 内均匀抽取一个门序号
    fn door(&mut self) -> u32;

    /// 在 `exclude` 之外的两扇门中均匀抽取一扇
    fn door_excluding(&mut self, exclude: u32) -> u32;

    /// 均匀抽取改变或坚持
    fn decision(&mut self) -> Decision;
}

/// 基于 rand 的默认随机源
#[derive(Debug, Default, Copy, Clone)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn door(&mut self) -> u32 {
        rand::thread_rng().gen_range(1..=DOOR_COUNT)
    }

    fn door_excluding(&mut self, exclude: u32) -> u32 {
        // 先在缩小一位的范围内抽取,再跳过被排除的门
        let random = rand::thread_rng().gen_range(1..DOOR_COUNT);
        if random >= exclude {
            random + 1
        } else {
            random
        }
    }

    fn decision(&mut self) -> Decision {
        rand::thread_rng().gen()
    }
}

/// 单局状态机,按 Setup → Selection → Reveal → Decision → Score 严格推进
#[derive(Debug)]
pub struct TrialEngine {
    doors: [Door; DOOR_COUNT as usize],
    stage: Stage,
}

impl Default for TrialEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialEngine {
    pub fn new() -> Self {
        Self {
            doors: [Door::new(1), Door::new(2), Door::new(3)],
            stage: Stage::Idle,
        }
    }

    /// 当前阶段
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// 三扇门的当前状态
    pub fn doors(&self) -> &[Door; DOOR_COUNT as usize] {
        &self.doors
    }

    fn door_mut(&mut self, index: u32) -> Result<&mut Door> {
        if !(1..=DOOR_COUNT).contains(&index) {
            return Err(Error::InvalidDoorIndex(index));
        }
        Ok(&mut self.doors[(index - 1) as usize])
    }

    /// 丢弃未完成的一局,回到等待状态
    pub fn reset(&mut self) {
        for door in &mut self.doors {
            door.clear();
        }
        self.stage = Stage::Idle;
    }

    /// 开始新的一局:清空所有门并随机放置奖品
    ///
    /// 任何阶段都可以调用;暂停后恢复会借此丢弃未完成的一局
    pub fn setup<R: RandomSource>(&mut self, rng: &mut R) -> Result<u32> {
        for door in &mut self.doors {
            door.clear();
        }
        let winning = rng.door();
        self.door_mut(winning)?.is_winner = true;
        self.stage = Stage::Setup { winning };
        Ok(winning)
    }

    /// 玩家随机选择一扇门,可能恰好是奖品门
    pub fn select<R: RandomSource>(&mut self, rng: &mut R) -> Result<u32> {
        let winning = match self.stage {
            Stage::Setup { winning } => winning,
            _ => return Err(Error::InvalidOperation),
        };
        let selected = rng.door();
        self.door_mut(selected)?.is_selected = true;
        self.stage = Stage::Selected { winning, selected };
        Ok(selected)
    }

    /// 主持人揭示一扇既没有奖品也未被选中的门
    ///
    /// 玩家恰好选中奖品门时,在剩余两扇门中均匀抽取一扇
    pub fn reveal<R: RandomSource>(&mut self, rng: &mut R) -> Result<u32> {
        let (winning, selected) = match self.stage {
            Stage::Selected { winning, selected } => (winning, selected),
            _ => return Err(Error::InvalidOperation),
        };
        let revealed = if winning == selected {
            rng.door_excluding(winning)
        } else {
            // 去掉奖品门和玩家选中的门之后只剩一扇
            (1..=DOOR_COUNT)
                .find(|&door| door != winning && door != selected)
                .ok_or(Error::InvariantViolated("no door left to reveal"))?
        };
        if revealed == winning || revealed == selected {
            return Err(Error::InvariantViolated(
                "revealed door must be neither the winner nor the selection",
            ));
        }
        self.door_mut(revealed)?.is_revealed = true;
        self.stage = Stage::Revealed {
            winning,
            selected,
            revealed,
        };
        Ok(revealed)
    }

    /// 随机抉择改变或坚持,确定玩家最终坚守的门
    pub fn decide<R: RandomSource>(&mut self, rng: &mut R) -> Result<(Decision, u32)> {
        let (winning, selected, revealed) = match self.stage {
            Stage::Revealed {
                winning,
                selected,
                revealed,
            } => (winning, selected, revealed),
            _ => return Err(Error::InvalidOperation),
        };
        let decision = rng.decision();
        let final_door = match decision {
            // 改选唯一一扇未选中且未被揭示的门
            Decision::Switch => (1..=DOOR_COUNT)
                .find(|&door| door != selected && door != revealed)
                .ok_or(Error::InvariantViolated("no door left to switch to"))?,
            Decision::Stay => selected,
        };
        let status = match decision {
            Decision::Switch => SwitchStatus::SwitchedTo,
            Decision::Stay => SwitchStatus::Stayed,
        };
        self.door_mut(final_door)?.switch_status = status;
        self.stage = Stage::Decided {
            winning,
            selected,
            revealed,
            decision,
            final_door,
        };
        Ok((decision, final_door))
    }

    /// 计分并把结果记入统计
    pub fn score(&mut self, statistics: &mut Statistics) -> Result<TrialOutcome> {
        let (winning, selected, revealed, decision, final_door) = match self.stage {
            Stage::Decided {
                winning,
                selected,
                revealed,
                decision,
                final_door,
            } => (winning, selected, revealed, decision, final_door),
            _ => return Err(Error::InvalidOperation),
        };
        self.check_invariants(winning, selected, revealed, final_door)?;
        let outcome = TrialOutcome {
            winning,
            selected,
            revealed,
            final_door,
            decision,
            win: final_door == winning,
        };
        statistics.record(&outcome)?;
        self.stage = Stage::Scored { outcome };
        Ok(outcome)
    }

    // 门上标记与本局记录不一致说明引擎存在缺陷,立即中止而不是悄悄修正
    fn check_invariants(
        &self,
        winning: u32,
        selected: u32,
        revealed: u32,
        final_door: u32,
    ) -> Result<()> {
        let winners = self.doors.iter().filter(|door| door.is_winner).count();
        if winners != 1 {
            return Err(Error::InvariantViolated(
                "exactly one door must hold the prize",
            ));
        }
        if revealed == winning || revealed == selected {
            return Err(Error::InvariantViolated(
                "revealed door must be neither the winner nor the selection",
            ));
        }
        if final_door == revealed || !(1..=DOOR_COUNT).contains(&final_door) {
            return Err(Error::InvariantViolated(
                "final door must be an unrevealed door",
            ));
        }
        Ok(())
    }
}

/// 单个策略的计数
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, Eq, PartialEq)]
pub struct StrategyCounter {
    /// 采用该策略的局数
    pub selections: u64,

    /// 其中赢得奖品的局数
    pub wins: u64,
}

/// 两种策略的计数快照
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, Eq, PartialEq)]
pub struct StatsSnapshot {
    /// 改变策略
    pub switch: StrategyCounter,

    /// 坚持策略
    pub stay: StrategyCounter,
}

/// 两种策略的胜负统计
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    switch: StrategyCounter,
    stay: StrategyCounter,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, decision: Decision) -> &StrategyCounter {
        match decision {
            Decision::Switch => &self.switch,
            Decision::Stay => &self.stay,
        }
    }

    fn counter_mut(&mut self, decision: Decision) -> &mut StrategyCounter {
        match decision {
            Decision::Switch => &mut self.switch,
            Decision::Stay => &mut self.stay,
        }
    }

    /// 登记一局采用该策略
    pub fn record_selection(&mut self, decision: Decision) {
        self.counter_mut(decision).selections += 1;
    }

    /// 登记该策略的一场胜局,胜局数不允许超过局数
    pub fn record_win(&mut self, decision: Decision) -> Result<()> {
        let counter = self.counter_mut(decision);
        if counter.wins >= counter.selections {
            return Err(Error::InvariantViolated("wins must not exceed selections"));
        }
        counter.wins += 1;
        Ok(())
    }

    /// 计分阶段的入口:登记一局,赢时再登记一场胜局
    pub fn record(&mut self, outcome: &TrialOutcome) -> Result<()> {
        self.record_selection(outcome.decision());
        if outcome.win() {
            self.record_win(outcome.decision())?;
        }
        Ok(())
    }

    /// 两种策略的计数一并清零
    pub fn clear(&mut self) {
        self.switch = StrategyCounter::default();
        self.stay = StrategyCounter::default();
    }

    /// 该策略的 (胜局数, 局数)
    pub fn counts(&self, decision: Decision) -> (u64, u64) {
        let counter = self.counter(decision);
        (counter.wins, counter.selections)
    }

    /// 该策略的胜率,没有记录时为 0
    pub fn win_rate(&self, decision: Decision) -> f64 {
        let counter = self.counter(decision);
        if counter.selections == 0 {
            0.0
        } else {
            counter.wins as f64 / counter.selections as f64
        }
    }

    /// 宽度为 `width` 的胜率条中应填充的格数,没有记录时为 0
    pub fn bar(&self, decision: Decision, width: usize) -> usize {
        let counter = self.counter(decision);
        if counter.selections == 0 {
            0
        } else {
            (width as u64 * counter.wins / counter.selections) as usize
        }
    }

    /// 已完成的总局数
    pub fn total_trials(&self) -> u64 {
        self.switch.selections + self.stay.selections
    }

    /// 当前计数的快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            switch: self.switch,
            stay: self.stay,
        }
    }
}

/// 可选的速度倍率,从慢到快
pub const SPEEDS: [f64; 10] = [
    0.5, 1.0, 2.0, 5.0, 10.0, 50.0, 100.0, 1000.0, 10000.0, 100000.0,
];

/// 默认速度档位
pub const DEFAULT_SPEED_INDEX: usize = 1;

/// 速度档位,决定两个阶段之间挂起多久
#[derive(Debug, Copy, Clone)]
pub struct SpeedController {
    index: usize,
}

impl Default for SpeedController {
    fn default() -> Self {
        Self {
            index: DEFAULT_SPEED_INDEX,
        }
    }
}

impl SpeedController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前档位
    pub fn index(&self) -> usize {
        self.index
    }

    /// 降一档,已在最低档时不变
    pub fn decrease(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// 升一档,已在最高档时不变
    pub fn increase(&mut self) {
        if self.index < SPEEDS.len() - 1 {
            self.index += 1;
        }
    }

    /// 当前速度倍率
    pub fn current_rate(&self) -> f64 {
        SPEEDS[self.index]
    }

    /// 两个阶段边界之间挂起的时长,速度越快延时越短,但永远大于零
    pub fn stage_delay(&self) -> Duration {
        let rate = self.current_rate();
        let delay = Duration::from_secs_f64(1.0 / (rate * rate));
        // Duration 只有纳秒精度,最高档会被取整到零,垫到 1ns 保持延时为正
        delay.max(Duration::from_nanos(1))
    }
}
