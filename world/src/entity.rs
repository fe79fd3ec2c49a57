use std::{collections::BTreeSet, time::Duration};

use crystal_defence_core::{
    BeanKind, BeanState, ControlKind, CrystalParams, CrystalState, DamageType, EntityId,
    EntityKind, PlayerId, Position, StatKey, Stats,
};

use crate::{profile::transform_incoming, BeanProfile, Intent};

/// Default basic attack range of a hero.
pub const DEFAULT_HERO_ATTACK_RANGE: f64 = 120.0;

/// Default basic attack interval of a hero.
pub const DEFAULT_HERO_ATTACK_INTERVAL: Duration = Duration::from_secs(1);

/// Experience needed per level to reach the next one.
const EXP_PER_LEVEL: u32 = 100;

/// Kind-specific state carried by an entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Role {
    /// Player-controlled defender.
    Hero(Hero),
    /// Wave enemy.
    Bean(Bean),
    /// The defended objective.
    Crystal(Crystal),
    /// Item lying in the world.
    Item,
    /// Projectile in flight.
    Projectile,
}

/// Hero-specific state.
#[derive(Clone, Debug, PartialEq)]
pub struct Hero {
    player: PlayerId,
    hero_id: String,
    slot: u8,
    level: u32,
    exp: u32,
    gold: u32,
    items: Vec<String>,
    attack_range: f64,
    attack_interval: Duration,
    target: Option<EntityId>,
    last_attack: Option<Duration>,
}

impl Hero {
    /// Creates a level 1 hero with default attack timing.
    #[must_use]
    pub fn new(player: PlayerId, hero_id: impl Into<String>, slot: u8) -> Self {
        Self {
            player,
            hero_id: hero_id.into(),
            slot,
            level: 1,
            exp: 0,
            gold: 0,
            items: Vec::new(),
            attack_range: DEFAULT_HERO_ATTACK_RANGE,
            attack_interval: DEFAULT_HERO_ATTACK_INTERVAL,
            target: None,
            last_attack: None,
        }
    }

    /// Overrides the basic attack range and interval.
    #[must_use]
    pub fn with_attack(mut self, range: f64, interval: Duration) -> Self {
        self.attack_range = range;
        self.attack_interval = interval;
        self
    }

    /// Sets the starting inventory.
    #[must_use]
    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    /// Owning player.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Hero template key.
    #[must_use]
    pub fn hero_id(&self) -> &str {
        &self.hero_id
    }

    /// Position slot around the crystal.
    #[must_use]
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Records a new position slot.
    pub fn set_slot(&mut self, slot: u8) {
        self.slot = slot;
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Experience towards the next level.
    #[must_use]
    pub fn exp(&self) -> u32 {
        self.exp
    }

    /// Gold collected.
    #[must_use]
    pub fn gold(&self) -> u32 {
        self.gold
    }

    /// Adds experience and returns the number of levels gained.
    pub fn gain_exp(&mut self, amount: u32) -> u32 {
        self.exp = self.exp.saturating_add(amount);
        let mut gained = 0;
        while self.exp >= self.level * EXP_PER_LEVEL {
            self.exp -= self.level * EXP_PER_LEVEL;
            self.level += 1;
            gained += 1;
        }
        gained
    }

    /// Adds gold.
    pub fn add_gold(&mut self, amount: u32) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Inventory in acquisition order.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Removes one copy of `item_id` from the inventory.
    pub fn take_item(&mut self, item_id: &str) -> bool {
        match self.items.iter().position(|item| item == item_id) {
            Some(index) => {
                let _ = self.items.remove(index);
                true
            }
            None => false,
        }
    }

    /// Basic attack range.
    #[must_use]
    pub fn attack_range(&self) -> f64 {
        self.attack_range
    }

    /// Basic attack interval.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        self.attack_interval
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Adopts or drops a target. Returns `true` when the target changed.
    pub fn set_target(&mut self, target: Option<EntityId>) -> bool {
        let changed = self.target != target;
        self.target = target;
        changed
    }

    /// Simulation time of the last basic attack.
    #[must_use]
    pub fn last_attack(&self) -> Option<Duration> {
        self.last_attack
    }

    /// Records a basic attack at `now`.
    pub fn record_attack(&mut self, now: Duration) {
        self.last_attack = Some(now);
    }

    /// Whether the attack interval has elapsed at `now`.
    #[must_use]
    pub fn ready_to_attack(&self, now: Duration) -> bool {
        interval_elapsed(self.last_attack, self.attack_interval, now)
    }
}

/// Bean-specific state.
#[derive(Clone, Debug, PartialEq)]
pub struct Bean {
    kind: BeanKind,
    state: BeanState,
    target: Option<EntityId>,
    target_position: Position,
    move_speed: f64,
    attack_range: f64,
    attack_interval: Duration,
    damage_type: DamageType,
    last_attack: Option<Duration>,
    special: bool,
    wave: usize,
    spawn_attack: f64,
}

impl Bean {
    /// Creates an idle bean of `kind` using its profile, with movement scaled
    /// by `speed_multiplier`.
    #[must_use]
    pub fn new(kind: BeanKind, speed_multiplier: f64, wave: usize, special: bool) -> Self {
        let profile = BeanProfile::of(kind);
        Self {
            kind,
            state: BeanState::Idle,
            target: None,
            target_position: Position::ZERO,
            move_speed: profile.move_speed * speed_multiplier,
            attack_range: profile.attack_range,
            attack_interval: profile.attack_interval,
            damage_type: profile.damage_type,
            last_attack: None,
            special,
            wave,
            spawn_attack: 0.0,
        }
    }

    /// Points the bean at an entity standing at `position`.
    #[must_use]
    pub fn targeting(mut self, target: EntityId, position: Position) -> Self {
        self.target = Some(target);
        self.target_position = position;
        self
    }

    /// Variety.
    #[must_use]
    pub fn kind(&self) -> BeanKind {
        self.kind
    }

    /// Behaviour state.
    #[must_use]
    pub fn state(&self) -> BeanState {
        self.state
    }

    /// Pursued entity.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Last known position of the pursued entity.
    #[must_use]
    pub fn target_position(&self) -> Position {
        self.target_position
    }

    /// Walking speed in world units per second.
    #[must_use]
    pub fn move_speed(&self) -> f64 {
        self.move_speed
    }

    /// Strike range.
    #[must_use]
    pub fn attack_range(&self) -> f64 {
        self.attack_range
    }

    /// Time between strikes.
    #[must_use]
    pub fn attack_interval(&self) -> Duration {
        self.attack_interval
    }

    /// Damage category of the bean's strikes.
    #[must_use]
    pub fn damage_type(&self) -> DamageType {
        self.damage_type
    }

    /// Whether the bean came from a one-shot special spawn.
    #[must_use]
    pub fn is_special(&self) -> bool {
        self.special
    }

    /// Index of the wave that spawned the bean.
    #[must_use]
    pub fn wave(&self) -> usize {
        self.wave
    }
}

/// Crystal-specific state.
#[derive(Clone, Debug, PartialEq)]
pub struct Crystal {
    state: CrystalState,
    defense_bonus_pct: f64,
    contact_damage: f64,
    invulnerability: Duration,
    invulnerable_until: Option<Duration>,
    damage_cooldown: Duration,
    last_hit: Option<Duration>,
}

impl Crystal {
    /// Creates crystal state from its construction parameters.
    #[must_use]
    pub fn new(params: &CrystalParams) -> Self {
        Self {
            state: CrystalState::Normal,
            defense_bonus_pct: params.defense_bonus_pct,
            contact_damage: params.contact_damage,
            invulnerability: Duration::from_millis(params.invulnerability_ms),
            invulnerable_until: None,
            damage_cooldown: Duration::from_millis(params.damage_cooldown_ms),
            last_hit: None,
        }
    }

    /// Health-derived state.
    #[must_use]
    pub fn state(&self) -> CrystalState {
        self.state
    }

    /// Percentage by which incoming damage is reduced.
    #[must_use]
    pub fn defense_bonus_pct(&self) -> f64 {
        self.defense_bonus_pct
    }

    /// Pure damage returned to every bean that strikes the crystal.
    #[must_use]
    pub fn contact_damage(&self) -> f64 {
        self.contact_damage
    }

    /// Whether hits are ignored at `now`.
    #[must_use]
    pub fn is_invulnerable(&self, now: Duration) -> bool {
        self.invulnerable_until.is_some_and(|until| now < until)
    }

    fn absorbs_hit(&self, now: Duration) -> bool {
        if self.is_invulnerable(now) {
            return true;
        }
        !self.damage_cooldown.is_zero()
            && self
                .last_hit
                .is_some_and(|last| now.saturating_sub(last) < self.damage_cooldown)
    }
}

/// Maps a health ratio to the crystal state.
#[must_use]
pub fn crystal_state_for(hp: f64, max_hp: f64) -> CrystalState {
    if hp <= 0.0 {
        return CrystalState::Destroyed;
    }
    let ratio = if max_hp > 0.0 { hp / max_hp } else { 0.0 };
    if ratio > 0.7 {
        CrystalState::Normal
    } else if ratio > 0.3 {
        CrystalState::Damaged
    } else {
        CrystalState::Critical
    }
}

/// Outcome of [`Entity::take_damage`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageTaken {
    /// Health actually removed.
    pub applied: f64,
    /// Whether this hit brought health to zero.
    pub killed: bool,
    /// Crystal state transition caused by the hit.
    pub crystal_change: Option<(CrystalState, CrystalState)>,
}

/// Read-only view of the entity another entity is pursuing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TargetView {
    pub(crate) position: Position,
    pub(crate) alive: bool,
}

#[derive(Debug, Default)]
pub(crate) struct UpdateOutcome {
    pub(crate) moved: Option<(Position, Position)>,
    pub(crate) state_change: Option<(BeanState, BeanState)>,
}

/// A simulation participant.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    name: String,
    position: Position,
    rotation: f64,
    stats: Stats,
    alive: bool,
    tags: BTreeSet<String>,
    created_frame: u64,
    updated_frame: u64,
    role: Role,
}

impl Entity {
    /// Creates an entity. `maxHp` defaults to `hp`; `hp` is clamped into
    /// `[0, maxHp]`.
    #[must_use]
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        position: Position,
        mut stats: Stats,
        mut role: Role,
    ) -> Self {
        if stats.contains(&StatKey::Hp) && !stats.contains(&StatKey::MaxHp) {
            stats.set(StatKey::MaxHp, stats.get(&StatKey::Hp));
        }
        if stats.contains(&StatKey::Mp) && !stats.contains(&StatKey::MaxMp) {
            stats.set(StatKey::MaxMp, stats.get(&StatKey::Mp));
        }
        let max_hp = stats.get(&StatKey::MaxHp);
        let has_health = stats.contains(&StatKey::MaxHp);
        if has_health {
            stats.set(StatKey::Hp, stats.get(&StatKey::Hp).clamp(0.0, max_hp.max(0.0)));
        }
        let hp = stats.get(&StatKey::Hp);
        let alive = !has_health || hp > 0.0;

        match &mut role {
            Role::Bean(bean) => {
                bean.spawn_attack = stats.get(&StatKey::Attack);
                if !alive {
                    bean.state = BeanState::Dead;
                }
            }
            Role::Crystal(crystal) => crystal.state = crystal_state_for(hp, max_hp),
            Role::Hero(_) | Role::Item | Role::Projectile => {}
        }

        Self {
            id,
            name: name.into(),
            position,
            rotation: 0.0,
            stats,
            alive,
            tags: BTreeSet::new(),
            created_frame: 0,
            updated_frame: 0,
            role,
        }
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Broad category.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self.role {
            Role::Hero(_) => EntityKind::Hero,
            Role::Bean(_) => EntityKind::Bean,
            Role::Crystal(_) => EntityKind::Crystal,
            Role::Item => EntityKind::Item,
            Role::Projectile => EntityKind::Projectile,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// World position.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Facing in radians.
    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Every attribute.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Reads one attribute, zero when absent.
    #[must_use]
    pub fn stat(&self, key: &StatKey) -> f64 {
        self.stats.get(key)
    }

    /// Current health.
    #[must_use]
    pub fn hp(&self) -> f64 {
        self.stats.get(&StatKey::Hp)
    }

    /// Health ceiling.
    #[must_use]
    pub fn max_hp(&self) -> f64 {
        self.stats.get(&StatKey::MaxHp)
    }

    /// Whether the entity is alive. Never returns to `true` once `false`.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Attached tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Whether `tag` is attached.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Logic frame of registration.
    #[must_use]
    pub fn created_frame(&self) -> u64 {
        self.created_frame
    }

    /// Logic frame of the last state-machine update.
    #[must_use]
    pub fn updated_frame(&self) -> u64 {
        self.updated_frame
    }

    /// Kind-specific state.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Hero state, if this is a hero.
    #[must_use]
    pub fn hero(&self) -> Option<&Hero> {
        match &self.role {
            Role::Hero(hero) => Some(hero),
            _ => None,
        }
    }

    /// Mutable hero state, if this is a hero.
    pub fn hero_mut(&mut self) -> Option<&mut Hero> {
        match &mut self.role {
            Role::Hero(hero) => Some(hero),
            _ => None,
        }
    }

    /// Bean state, if this is a bean.
    #[must_use]
    pub fn bean(&self) -> Option<&Bean> {
        match &self.role {
            Role::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    /// Crystal state, if this is the crystal.
    #[must_use]
    pub fn crystal(&self) -> Option<&Crystal> {
        match &self.role {
            Role::Crystal(crystal) => Some(crystal),
            _ => None,
        }
    }

    /// Assigns an attribute, keeping `hp` and `mp` inside their ceilings.
    pub fn set_stat(&mut self, key: StatKey, value: f64) {
        match key {
            StatKey::Hp => self.write_hp(value),
            StatKey::MaxHp => {
                self.stats.set(StatKey::MaxHp, value.max(0.0));
                if self.hp() > self.max_hp() {
                    self.write_hp(self.max_hp());
                }
            }
            StatKey::Mp => {
                let ceiling = self.mp_ceiling();
                self.stats.set(StatKey::Mp, value.clamp(0.0, ceiling));
            }
            StatKey::MaxMp => {
                self.stats.set(StatKey::MaxMp, value.max(0.0));
                let mp = self.stat(&StatKey::Mp).min(value.max(0.0));
                self.stats.set(StatKey::Mp, mp);
            }
            other => self.stats.set(other, value),
        }
    }

    /// Adds a signed delta to an attribute and returns the stored value.
    pub fn add_to_stat(&mut self, key: StatKey, delta: f64) -> f64 {
        let value = self.stats.get(&key) + delta;
        self.set_stat(key.clone(), value);
        self.stats.get(&key)
    }

    /// Applies a resolved hit, letting the entity's role transform it first.
    pub fn take_damage(&mut self, amount: f64, damage_type: DamageType, now: Duration) -> DamageTaken {
        if !self.alive {
            return DamageTaken::default();
        }

        let mut amount = amount.max(0.0);
        match &mut self.role {
            Role::Bean(bean) => {
                amount = transform_incoming(bean.kind, amount, damage_type);
            }
            Role::Crystal(crystal) => {
                if crystal.absorbs_hit(now) {
                    tracing::trace!(entity = %self.id, "crystal absorbed hit");
                    return DamageTaken::default();
                }
                let reduction = (crystal.defense_bonus_pct / 100.0).clamp(0.0, 1.0);
                amount *= 1.0 - reduction;
                crystal.last_hit = Some(now);
            }
            Role::Hero(_) | Role::Item | Role::Projectile => {}
        }

        let before = self.hp();
        self.write_hp(before - amount);
        let after = self.hp();

        let mut crystal_change = None;
        let (hp, max_hp) = (after, self.max_hp());
        match &mut self.role {
            Role::Bean(bean) if bean.kind == BeanKind::Rage && self.alive => {
                let cap = bean.spawn_attack * 2.0;
                let attack = (self.stats.get(&StatKey::Attack) + 1.0).min(cap);
                self.stats.set(StatKey::Attack, attack);
            }
            Role::Crystal(crystal) => {
                let next = crystal_state_for(hp, max_hp);
                if next != crystal.state {
                    if next == CrystalState::Critical && !crystal.invulnerability.is_zero() {
                        crystal.invulnerable_until = Some(now + crystal.invulnerability);
                    }
                    crystal_change = Some((crystal.state, next));
                    crystal.state = next;
                }
            }
            _ => {}
        }

        DamageTaken {
            applied: before - after,
            killed: before > 0.0 && after <= 0.0,
            crystal_change,
        }
    }

    /// Restores health, clamped to the headroom. Returns the amount restored.
    pub fn heal(&mut self, amount: f64) -> f64 {
        if !self.alive {
            return 0.0;
        }
        let before = self.hp();
        self.write_hp(before + amount.max(0.0));
        let after = self.hp();
        if let Role::Crystal(crystal) = &mut self.role {
            crystal.state = crystal_state_for(after, self.stats.get(&StatKey::MaxHp));
        }
        after - before
    }

    pub(crate) fn set_position(&mut self, position: Position) -> Position {
        std::mem::replace(&mut self.position, position)
    }

    pub(crate) fn insert_tag(&mut self, tag: &str) -> bool {
        self.tags.insert(tag.to_owned())
    }

    pub(crate) fn delete_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    pub(crate) fn mark_created(&mut self, frame: u64) {
        self.created_frame = frame;
        self.updated_frame = frame;
    }

    /// Entity whose position drives this entity's behaviour.
    pub(crate) fn pursued(&self) -> Option<EntityId> {
        match &self.role {
            Role::Hero(hero) => hero.target,
            Role::Bean(bean) => bean.target,
            _ => None,
        }
    }

    /// Advances the entity's state machine by one inner frame.
    pub(crate) fn update(
        &mut self,
        dt: Duration,
        now: Duration,
        frame: u64,
        target: Option<TargetView>,
        out: &mut Vec<Intent>,
    ) -> UpdateOutcome {
        self.updated_frame = frame;
        match self.role {
            Role::Bean(_) => self.update_bean(dt, now, target, out),
            Role::Hero(_) => {
                self.update_hero(now, target, out);
                UpdateOutcome::default()
            }
            Role::Crystal(_) | Role::Item | Role::Projectile => UpdateOutcome::default(),
        }
    }

    fn update_bean(
        &mut self,
        dt: Duration,
        now: Duration,
        target: Option<TargetView>,
        out: &mut Vec<Intent>,
    ) -> UpdateOutcome {
        let disabled = self.has_tag(ControlKind::Stun.tag()) || self.has_tag(ControlKind::Freeze.tag());
        let slowed = self.has_tag(ControlKind::Slow.tag());
        let rooted = self.has_tag(ControlKind::Root.tag());
        let attack = self.stats.get(&StatKey::Attack);
        let (id, alive, position) = (self.id, self.alive, self.position);

        let Role::Bean(bean) = &mut self.role else {
            return UpdateOutcome::default();
        };
        let from = bean.state;
        let mut outcome = UpdateOutcome::default();

        if !alive {
            bean.state = BeanState::Dead;
        } else if disabled {
            bean.state = BeanState::Stunned;
        } else {
            if bean.state == BeanState::Stunned {
                bean.state = BeanState::Idle;
            }
            match target.filter(|view| view.alive) {
                None => bean.state = BeanState::Idle,
                Some(view) => {
                    bean.target_position = view.position;
                    if bean.state == BeanState::Idle {
                        bean.state = BeanState::Move;
                    }
                    let distance = position.distance(view.position);
                    match bean.state {
                        BeanState::Move if distance <= bean.attack_range => {
                            bean.state = BeanState::Attack;
                        }
                        BeanState::Move => {
                            let mut step = bean.move_speed * dt.as_secs_f64();
                            if slowed {
                                step *= 0.5;
                            }
                            if rooted {
                                step = 0.0;
                            }
                            let step = step.min(distance);
                            if step > 0.0 {
                                let direction = (view.position - position).normalize_or_zero();
                                outcome.moved = Some((position, position + direction * step));
                            }
                        }
                        BeanState::Attack if distance > bean.attack_range => {
                            bean.state = BeanState::Move;
                        }
                        BeanState::Attack => {
                            if interval_elapsed(bean.last_attack, bean.attack_interval, now) {
                                if let Some(target) = bean.target {
                                    out.push(Intent::Attack {
                                        attacker: id,
                                        target,
                                        amount: attack,
                                        damage_type: bean.damage_type,
                                    });
                                }
                                bean.last_attack = Some(now);
                                bean.state = BeanState::Move;
                            }
                        }
                        BeanState::Idle | BeanState::Stunned | BeanState::Dead => {}
                    }
                }
            }
        }

        if bean.state != from {
            outcome.state_change = Some((from, bean.state));
        }
        if let Some((from, to)) = outcome.moved {
            self.rotation = facing(from, to);
            self.position = to;
        }
        outcome
    }

    fn update_hero(&mut self, now: Duration, target: Option<TargetView>, out: &mut Vec<Intent>) {
        if !self.alive || self.has_tag(ControlKind::Stun.tag()) || self.has_tag(ControlKind::Freeze.tag()) {
            return;
        }
        let attack = self.stats.get(&StatKey::Attack);
        let (id, position) = (self.id, self.position);
        let Some(view) = target.filter(|view| view.alive) else {
            return;
        };
        self.rotation = facing(position, view.position);

        let Role::Hero(hero) = &mut self.role else {
            return;
        };
        let Some(target) = hero.target else {
            return;
        };
        if position.distance(view.position) <= hero.attack_range && hero.ready_to_attack(now) {
            out.push(Intent::Attack {
                attacker: id,
                target,
                amount: attack,
                damage_type: DamageType::Physical,
            });
            hero.last_attack = Some(now);
        }
    }

    fn mp_ceiling(&self) -> f64 {
        if self.stats.contains(&StatKey::MaxMp) {
            self.stats.get(&StatKey::MaxMp)
        } else {
            f64::INFINITY
        }
    }

    fn write_hp(&mut self, value: f64) {
        if !self.alive {
            return;
        }
        let clamped = value.clamp(0.0, self.max_hp().max(0.0));
        self.stats.set(StatKey::Hp, clamped);
        if clamped <= 0.0 {
            self.alive = false;
            match &mut self.role {
                Role::Bean(bean) => bean.state = BeanState::Dead,
                Role::Crystal(crystal) => crystal.state = CrystalState::Destroyed,
                Role::Hero(_) | Role::Item | Role::Projectile => {}
            }
        }
    }
}

fn facing(from: Position, to: Position) -> f64 {
    let delta = to - from;
    delta.y.atan2(delta.x)
}

fn interval_elapsed(last: Option<Duration>, interval: Duration, now: Duration) -> bool {
    last.map_or(true, |last| now.saturating_sub(last) >= interval)
}
