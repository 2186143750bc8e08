//! The world owner. Connections submit requests over one queue; this task applies them one
//! at a time, so every command sees and leaves a consistent world.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::actor::{Actor, Role, StarterKit, actor_key, validate_name};
use crate::authz;
use crate::command::{self, Command};
use crate::error::CommandError;
use crate::exec;
use crate::mobs::{MAX_MOB_LEVEL, all_mob_templates, find_mob_template};
use crate::store::ActorStore;
use crate::study;
use crate::view;
use crate::world::{World, capitalize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(Bytes),
    Close,
}

/// Per-connection output. Unbounded so the world never waits on a slow socket.
pub type OutTx = mpsc::UnboundedSender<Outbound>;

#[derive(Debug)]
pub enum WorldReq {
    Attach {
        session: SessionId,
        name: String,
        out: OutTx,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Input {
        session: SessionId,
        line: String,
    },
    Detach {
        session: SessionId,
    },
    /// Save everyone, close every connection, and stop the run loop.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct ShardConfig {
    pub kit: &'static StarterKit,
    /// Actor keys created as keepers when they have no stored record yet.
    pub bootstrap_keepers: HashSet<String>,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            kit: StarterKit::default_kit(),
            bootstrap_keepers: HashSet::new(),
        }
    }
}

struct Session {
    actor: String,
    out: OutTx,
}

pub struct Shard {
    world: World,
    store: Box<dyn ActorStore>,
    cfg: ShardConfig,
    sessions: HashMap<SessionId, Session>,
    by_actor: HashMap<String, SessionId>,
}

const HELP: &str = "\
commands:\r
  look [thing] | stats | abilities [name] | save | quit\r
  go <exit> | n s e w u d\r
  cast <spell> [target]\r
  <maneuver> <target>      (kick, slash, power attack, cleave)\r
  consider <target>\r
  study <item> | train <trainer> [maneuver]\r
keeper:\r
  teleport <room-id> | spawn <mob> [level] | restore [actor]\r
  makekeeper <actor> | removekeeper <actor>\r
";

impl Shard {
    pub fn new(world: World, store: Box<dyn ActorStore>, cfg: ShardConfig) -> Self {
        Self {
            world,
            store,
            cfg,
            sessions: HashMap::new(),
            by_actor: HashMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn handle(&mut self, req: WorldReq) {
        match req {
            WorldReq::Attach {
                session,
                name,
                out,
                reply,
            } => {
                let res = self.attach(session, name.trim(), out);
                if let Err(reason) = &res {
                    debug!(session = %session, name = %name, reason = %reason, "attach rejected");
                }
                let _ = reply.send(res);
            }
            WorldReq::Input { session, line } => self.on_input(session, &line),
            WorldReq::Detach { session } => self.detach(session),
            WorldReq::Shutdown => self.shutdown(),
        }
    }

    /// Owns the world until every sender is gone. Each request is stamped with monotonic
    /// time before it runs.
    pub async fn run(mut self, mut rx: mpsc::Receiver<WorldReq>, autosave_every: Duration) {
        let start = tokio::time::Instant::now();
        let mut autosave = tokio::time::interval_at(start + autosave_every, autosave_every);
        autosave.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                req = rx.recv() => {
                    let Some(req) = req else { break };
                    if matches!(req, WorldReq::Shutdown) {
                        break;
                    }
                    self.world.advance_to(start.elapsed().as_millis() as u64);
                    self.handle(req);
                }
                _ = autosave.tick() => {
                    self.world.advance_to(start.elapsed().as_millis() as u64);
                    self.autosave();
                }
            }
        }
        self.world.advance_to(start.elapsed().as_millis() as u64);
        self.shutdown();
    }

    /// Save every live actor. Failures are logged and left for the next pass.
    pub fn autosave(&mut self) -> usize {
        let keys = self.by_actor.keys().cloned().collect::<Vec<_>>();
        let mut saved = 0;
        for k in &keys {
            if self.save_actor(k).is_ok() {
                saved += 1;
            }
        }
        debug!(saved, live = keys.len(), "autosave");
        saved
    }

    pub fn shutdown(&mut self) {
        let sids = self.sessions.keys().copied().collect::<Vec<_>>();
        for sid in sids {
            self.send_line(sid, "The world is shutting down.");
            self.send(sid, Outbound::Close);
            self.detach(sid);
        }
        info!("world stopped");
    }

    fn attach(&mut self, sid: SessionId, name: &str, out: OutTx) -> Result<(), String> {
        validate_name(name)?;
        let key = actor_key(name);
        if self.by_actor.contains_key(&key) {
            return Err("that name is already in use".to_string());
        }
        if self.sessions.contains_key(&sid) {
            return Err("this connection already has a character".to_string());
        }

        let now = self.world.now_ms();
        let (actor, fresh) = match self.store.load(name) {
            Ok(Some(rec)) => (Actor::from_record(rec, now), false),
            Ok(None) => {
                let start = self.world.rooms().start_room().to_string();
                let mut a = self.cfg.kit.outfit(&capitalize(name), &start);
                if self.cfg.bootstrap_keepers.contains(&key) {
                    a.role = Role::Keeper;
                }
                (a, true)
            }
            Err(e) => {
                warn!(name = %name, err = %e, "actor record load failed");
                return Err("that character could not be loaded; try again later".to_string());
            }
        };

        let key = self
            .world
            .add_actor(actor)
            .map_err(|_| "that name is already in use".to_string())?;
        if fresh {
            if let Err(e) = self.save_actor(&key) {
                warn!(name = %name, err = %e, "initial save failed");
            }
        }
        let Some(a) = self.world.actor(&key) else {
            return Err("that character could not be placed".to_string());
        };
        let (shown, room, keeper) = (a.name.clone(), a.room_id.clone(), a.role.is_keeper());
        self.sessions.insert(
            sid,
            Session {
                actor: key.clone(),
                out,
            },
        );
        self.by_actor.insert(key.clone(), sid);
        info!(session = %sid, name = %shown, keeper, new = fresh, "actor attached");

        let mut s = format!("Welcome, {shown}.\r\n");
        if fresh {
            s.push_str(&format!("You begin as a {}. Type 'help' for commands.\r\n", self.cfg.kit.id));
        }
        s.push_str(&self.world.render_room(&room, &key));
        self.send_text(sid, s);
        self.tell_room(&room, Some(&key), &format!("* {shown} joined"));
        Ok(())
    }

    fn detach(&mut self, sid: SessionId) {
        let Some(sess) = self.sessions.get(&sid) else {
            return;
        };
        let key = sess.actor.clone();
        if let Err(e) = self.save_actor(&key) {
            warn!(session = %sid, actor = %key, err = %e, "final save failed");
        }
        self.drop_session(sid);
    }

    fn drop_session(&mut self, sid: SessionId) {
        let Some(sess) = self.sessions.remove(&sid) else {
            return;
        };
        self.by_actor.remove(&sess.actor);
        if let Some(a) = self.world.remove_actor(&sess.actor) {
            info!(session = %sid, name = %a.name, "actor detached");
            self.tell_room(&a.room_id, None, &format!("* {} left", a.name));
        }
    }

    fn save_actor(&mut self, key: &str) -> Result<(), CommandError> {
        let now = self.world.now_ms();
        let Some(a) = self.world.actor_mut(key) else {
            return Err(CommandError::NotFound(format!("no actor named {key}")));
        };
        a.prune_cooldowns(now);
        let rec = a.to_record(now);
        self.store.save(&rec).map_err(|e| {
            warn!(actor = %rec.name, err = %e, "save failed");
            CommandError::from(e)
        })?;
        debug!(actor = %rec.name, "saved");
        Ok(())
    }

    fn on_input(&mut self, sid: SessionId, line: &str) {
        let Some(sess) = self.sessions.get(&sid) else {
            debug!(session = %sid, "input for unknown session");
            return;
        };
        // The connection is gone; whatever it queued before hanging up never starts.
        if sess.out.is_closed() {
            debug!(session = %sid, "dropping input from closed connection");
            return;
        }
        let key = sess.actor.clone();
        if let Err(e) = self.run_command(sid, &key, line) {
            if e == CommandError::PermissionDenied {
                info!(actor = %key, line = %line, "privileged command denied");
            } else {
                debug!(actor = %key, kind = e.kind(), "command failed");
            }
            self.send_line(sid, &e.to_string());
        }
    }

    fn run_command(&mut self, sid: SessionId, key: &str, line: &str) -> Result<(), CommandError> {
        let cmd = command::parse(line, self.world.catalog())?;
        if let Some(p) = cmd.privilege() {
            let role = self.world.actor(key).map(|a| a.role).unwrap_or_default();
            authz::authorize(role, p)?;
        }

        match cmd {
            Command::Empty => {}
            Command::Help => self.send_text(sid, HELP.to_string()),
            Command::Look(what) => {
                let room = self.room_of(key)?;
                let s = if what.is_empty() {
                    self.world.render_room(&room, key)
                } else {
                    self.world
                        .describe(&room, &what)
                        .ok_or_else(|| CommandError::InvalidTarget(what.clone()))?
                };
                self.send_text(sid, s);
            }
            Command::Stats => {
                let a = self.actor(key)?;
                let s = view::render_stats(a);
                self.send_text(sid, s);
            }
            Command::Abilities(name) => {
                let a = self.actor(key)?;
                let s = if name.is_empty() {
                    view::render_abilities(a, self.world.catalog(), self.world.now_ms())
                } else {
                    let def = self
                        .world
                        .catalog()
                        .find_any(&name)
                        .ok_or_else(|| CommandError::NotFound(format!("no ability called '{name}'")))?;
                    view::render_ability(def, a)
                };
                self.send_text(sid, s);
            }
            Command::Go(dir) => {
                let room = self.room_of(key)?;
                let to = self
                    .world
                    .rooms()
                    .find_exit(&room, &dir)
                    .map(|e| e.to.clone())
                    .ok_or_else(|| CommandError::NotFound(format!("you can't go '{dir}' from here")))?;
                self.relocate(sid, key, &to, "leaves", "arrives")?;
            }
            Command::Cast(args) => {
                let (id, target) = exec::resolve_cast(&self.world, key, &args)?;
                self.use_ability(sid, key, id, target.as_deref())?;
            }
            Command::Maneuver { ability_id, target } => {
                self.use_ability(sid, key, ability_id, target.as_deref())?;
            }
            Command::Study(kw) => {
                let r = study::study(&mut self.world, key, &kw)?;
                let name = self.actor(key)?.name.clone();
                let room = self.room_of(key)?;
                let mut s = format!(
                    "You study the {} and learn {}! ({}%)\r\n",
                    r.item_name, r.ability_display, r.proficiency
                );
                if r.consumed {
                    s.push_str(&format!("The {} crumbles to dust.\r\n", r.item_name));
                }
                self.send_text(sid, s);
                self.tell_room(&room, Some(key), &format!("* {name} studies the {}.", r.item_name));
                info!(actor = %name, ability = r.ability_id, item = r.item_name, "ability learned");
            }
            Command::Train(args) => {
                let r = study::train(&mut self.world, key, &args)?;
                let name = self.actor(key)?.name.clone();
                let room = self.room_of(key)?;
                self.send_line(
                    sid,
                    &format!(
                        "You train with {} and learn {}! ({}%)",
                        r.trainer_name, r.ability_display, r.proficiency
                    ),
                );
                self.tell_room(&room, Some(key), &format!("* {name} trains with {}.", r.trainer_name));
                info!(actor = %name, ability = r.ability_id, trainer = r.trainer_name, "ability trained");
            }
            Command::Consider(what) => {
                let s = view::consider(&self.world, key, &what)?;
                self.send_text(sid, s);
            }
            Command::Save => {
                self.save_actor(key)?;
                self.send_line(sid, "Saved.");
            }
            Command::Quit => {
                self.save_actor(key)?;
                self.send_line(sid, "Saved. Goodbye.");
                self.send(sid, Outbound::Close);
                self.drop_session(sid);
            }
            Command::Teleport(args) => {
                let to = args.trim();
                if to.is_empty() {
                    return Err(CommandError::Usage("teleport <room-id>"));
                }
                if !self.world.rooms().has_room(to) {
                    return Err(CommandError::NotFound(format!("no such room: {to}")));
                }
                self.relocate(sid, key, to, "vanishes in a flash", "appears in a flash")?;
                info!(actor = %key, room = %to, "teleport");
            }
            Command::Spawn(args) => self.spawn(key, &args)?,
            Command::GrantKeeper(name) => self.set_role(sid, key, &name, Role::Keeper)?,
            Command::RevokeKeeper(name) => self.set_role(sid, key, &name, Role::Player)?,
            Command::Restore(args) => self.restore(sid, key, &args)?,
        }
        Ok(())
    }

    fn use_ability(
        &mut self,
        sid: SessionId,
        key: &str,
        ability_id: &str,
        target: Option<&str>,
    ) -> Result<(), CommandError> {
        let r = exec::execute(&mut self.world, key, ability_id, target)?;
        self.send_lines(sid, &r.actor_lines);
        for line in &r.room_lines {
            self.tell_room(&r.room, Some(key), line);
        }
        if r.killed {
            info!(actor = %key, ability = r.ability_id, room = %r.room, "mob killed");
        }
        if let Some((_, to)) = &r.knocked_out {
            let name = self.actor(key)?.name.clone();
            self.tell_room(to, Some(key), &format!("* {name} is carried in, groaning."));
            let s = self.world.render_room(to, key);
            self.send_text(sid, s);
            info!(actor = %key, room = %r.room, "actor knocked out");
        }
        Ok(())
    }

    fn relocate(
        &mut self,
        sid: SessionId,
        key: &str,
        to: &str,
        leave: &str,
        arrive: &str,
    ) -> Result<(), CommandError> {
        let from = self.world.move_actor(key, to)?;
        let name = self.actor(key)?.name.clone();
        self.tell_room(&from, Some(key), &format!("* {name} {leave}."));
        self.tell_room(to, Some(key), &format!("* {name} {arrive}."));
        let s = self.world.render_room(to, key);
        self.send_text(sid, s);
        Ok(())
    }

    fn spawn(&mut self, key: &str, args: &str) -> Result<(), CommandError> {
        const USAGE: &str = "spawn <mob-template-id> [level 1-50]";
        let mut words = args.split_whitespace();
        let Some(tid) = words.next() else {
            return Err(CommandError::Usage(USAGE));
        };
        let level = match words.next() {
            None => 1,
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|l| (1..=MAX_MOB_LEVEL).contains(l))
                .ok_or(CommandError::Usage(USAGE))?,
        };
        let template = find_mob_template(tid).ok_or_else(|| {
            let known = all_mob_templates().iter().map(|m| m.id).collect::<Vec<_>>();
            CommandError::NotFound(format!("no mob template '{tid}' (known: {})", known.join(", ")))
        })?;
        let room = self.room_of(key)?;
        let m = self.world.spawn_mob(&room, template, level)?;
        let line = format!("* {} appears. (lvl {}, {} hp)", capitalize(m.name()), m.level, m.hp);
        self.tell_room(&room, None, &line);
        info!(actor = %key, template = template.id, level, room = %room, "spawn");
        Ok(())
    }

    fn restore(&mut self, sid: SessionId, key: &str, args: &str) -> Result<(), CommandError> {
        let target = if args.trim().is_empty() {
            key.to_string()
        } else {
            actor_key(args)
        };
        let a = self
            .world
            .actor_mut(&target)
            .ok_or_else(|| CommandError::NotFound(format!("no one named {} is here", args.trim())))?;
        a.vitals.refill();
        let name = a.name.clone();
        self.tell_actor(&target, "You feel fully restored.");
        if target != key {
            self.send_line(sid, &format!("{name} is fully restored."));
        }
        info!(actor = %key, target = %name, "restore");
        Ok(())
    }

    /// Role changes persist before the live record flips, so a failed write changes nothing.
    fn set_role(
        &mut self,
        sid: SessionId,
        by: &str,
        target: &str,
        role: Role,
    ) -> Result<(), CommandError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(CommandError::Usage(if role.is_keeper() {
                "makekeeper <actor-name>"
            } else {
                "removekeeper <actor-name>"
            }));
        }
        let missing = || CommandError::NotFound(format!("no actor named {target}"));
        validate_name(target).map_err(|_| missing())?;

        let tkey = actor_key(target);
        let now = self.world.now_ms();
        let name = if let Some(a) = self.world.actor(&tkey) {
            let name = a.name.clone();
            if a.role == role {
                self.send_line(sid, &format!("{name} is already a {}.", role.as_str()));
                return Ok(());
            }
            let mut rec = a.to_record(now);
            rec.is_keeper = role.is_keeper();
            self.store.save(&rec)?;
            if let Some(a) = self.world.actor_mut(&tkey) {
                a.role = role;
            }
            let note = if role.is_keeper() {
                "You have been made a keeper."
            } else {
                "You are no longer a keeper."
            };
            self.tell_actor(&tkey, note);
            name
        } else {
            let mut rec = self
                .store
                .load(target)
                .map_err(|e| {
                    warn!(actor = %target, err = %e, "actor record load failed");
                    CommandError::from_load(e)
                })?
                .ok_or_else(missing)?;
            if rec.is_keeper == role.is_keeper() {
                self.send_line(sid, &format!("{} is already a {}.", rec.name, role.as_str()));
                return Ok(());
            }
            rec.is_keeper = role.is_keeper();
            self.store.save(&rec)?;
            rec.name
        };

        info!(by = %by, target = %name, role = role.as_str(), "role changed");
        self.send_line(sid, &format!("{name} is now a {}.", role.as_str()));
        Ok(())
    }

    fn actor(&self, key: &str) -> Result<&Actor, CommandError> {
        self.world
            .actor(key)
            .ok_or_else(|| CommandError::NotFound(format!("no actor named {key}")))
    }

    fn room_of(&self, key: &str) -> Result<String, CommandError> {
        Ok(self.actor(key)?.room_id.clone())
    }

    fn send(&self, sid: SessionId, msg: Outbound) {
        if let Some(s) = self.sessions.get(&sid) {
            let _ = s.out.send(msg);
        }
    }

    fn send_text(&self, sid: SessionId, s: String) {
        self.send(sid, Outbound::Text(Bytes::from(s)));
    }

    fn send_line(&self, sid: SessionId, line: &str) {
        self.send_text(sid, format!("{line}\r\n"));
    }

    fn send_lines(&self, sid: SessionId, lines: &[String]) {
        let mut s = String::new();
        for l in lines {
            s.push_str(l);
            s.push_str("\r\n");
        }
        self.send_text(sid, s);
    }

    fn tell_actor(&self, key: &str, line: &str) {
        if let Some(sid) = self.by_actor.get(key) {
            self.send_line(*sid, line);
        }
    }

    fn tell_room(&self, room: &str, except: Option<&str>, line: &str) {
        for k in self.world.actor_keys_in_room(room) {
            if Some(k.as_str()) == except {
                continue;
            }
            self.tell_actor(&k, line);
        }
    }
}
