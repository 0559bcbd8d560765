//! Arc Mind - Interactive console
//!
//! Spawns agent brains into a small seeded demo world and drives them tick
//! by tick. This is the administrative surface: spawn, despawn, list,
//! status, save, reload, plus requests and team proposals.

use ahash::AHashMap;
use arc_mind::actions::{Intent, ScriptHandle, ScriptedExecutor};
use arc_mind::brain::{BrainEvent, BrainStatus};
use arc_mind::command::TaskRequest;
use arc_mind::core::config::MindConfig;
use arc_mind::core::error::Result;
use arc_mind::core::types::{AgentId, Tick, Vec3};
use arc_mind::goals::ReplanOutcome;
use arc_mind::llm::{LlmClient, LlmReasoner, OfflineReasoner, ReasoningService};
use arc_mind::persistence::{FileStore, Persistence, VolatileStore};
use arc_mind::registry::AgentRegistry;
use arc_mind::world::{AgentVitals, BlockSample, NearbyEntity, TerrainSample, WorldSnapshot};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// How far an agent perceives entities and blocks
const SIGHT_RANGE: f32 = 24.0;
/// Hostiles this close deal damage every tick
const MELEE_RANGE: f32 = 3.0;

/// Arc Mind console - autonomous agents over a demo world
#[derive(Parser, Debug)]
#[command(name = "arc_mind")]
#[command(about = "Drive autonomous agent brains over a small demo world")]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for learned state; kept in memory when omitted
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seed for the demo world
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Polls each scripted action needs before it completes
    #[arg(long, default_value_t = 3)]
    action_ticks: u32,

    /// Seconds a reasoning call may take
    #[arg(long, default_value_t = 30)]
    llm_timeout: u64,
}

/// One agent's body in the demo world
struct Body {
    position: Vec3,
    facing: Vec3,
    health: f32,
    executor: ScriptHandle,
    /// Intents already applied to the body
    applied: usize,
}

/// Deterministic little world the console drives
struct DemoWorld {
    rng: ChaCha8Rng,
    bodies: AHashMap<AgentId, Body>,
    hostiles: Vec<NearbyEntity>,
    resources: Vec<BlockSample>,
    version: u64,
}

impl DemoWorld {
    fn new(seed: u64) -> Self {
        let block = |kind: &str, x: f32, z: f32| BlockSample {
            kind: kind.to_string(),
            position: Vec3::new(x, 64.0, z),
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            bodies: AHashMap::new(),
            hostiles: vec![NearbyEntity {
                id: "zombie-1".into(),
                kind: "zombie".into(),
                position: Vec3::new(30.0, 64.0, 30.0),
                hostile: true,
            }],
            resources: vec![
                block("oak_log", 8.0, 4.0),
                block("oak_log", 10.0, -6.0),
                block("iron_ore", -12.0, 9.0),
                block("stone", 5.0, 5.0),
            ],
            version: 0,
        }
    }

    fn add_body(&mut self, id: AgentId, executor: ScriptHandle) {
        let offset = self.bodies.len() as f32 * 2.0;
        self.bodies.insert(
            id,
            Body {
                position: Vec3::new(offset, 64.0, 0.0),
                facing: Vec3::new(1.0, 0.0, 0.0),
                health: 20.0,
                executor,
                applied: 0,
            },
        );
    }

    fn remove_body(&mut self, id: AgentId) {
        self.bodies.remove(&id);
    }

    /// Apply issued intents, move hostiles, deal damage
    fn step(&mut self) {
        self.version += 1;

        for hostile in &mut self.hostiles {
            hostile.position.x += self.rng.gen_range(-1.0..=1.0);
            hostile.position.z += self.rng.gen_range(-1.0..=1.0);
        }

        for body in self.bodies.values_mut() {
            let issued = body.executor.issued();
            for intent in &issued[body.applied.min(issued.len())..] {
                match intent {
                    Intent::MoveTo { position } => {
                        let heading = (*position - body.position).normalize();
                        if heading.length() > 0.0 {
                            body.facing = heading;
                        }
                        body.position = *position;
                    }
                    Intent::UseItem { item } if item == "bread" => {
                        body.health = (body.health + 6.0).min(20.0);
                    }
                    Intent::Attack { target } => {
                        self.hostiles.retain(|h| h.id != *target || self.rng.gen_bool(0.7));
                    }
                    Intent::UseItem { .. } | Intent::Stop => {}
                }
            }
            body.applied = issued.len();

            let position = body.position;
            if self.hostiles.iter().any(|h| h.position.distance(&position) <= MELEE_RANGE) {
                body.health = (body.health - 1.0).max(1.0);
            }
        }
    }

    fn snapshot(&self, id: AgentId, tick: Tick) -> Option<WorldSnapshot> {
        let body = self.bodies.get(&id)?;
        let here = body.position;
        Some(WorldSnapshot {
            tick,
            version: self.version,
            agent: AgentVitals {
                position: here,
                facing: body.facing,
                health: body.health,
                max_health: 20.0,
                inventory: vec![("bread".into(), 3), ("planks".into(), 16)],
            },
            nearby: self
                .hostiles
                .iter()
                .filter(|h| h.position.distance(&here) <= SIGHT_RANGE)
                .cloned()
                .collect(),
            terrain: TerrainSample {
                ground_ahead: true,
                hazards: Vec::new(),
                blocks: self
                    .resources
                    .iter()
                    .filter(|b| b.position.distance(&here) <= SIGHT_RANGE)
                    .cloned()
                    .collect(),
            },
        })
    }

    fn snapshots(&self, tick: Tick) -> AHashMap<AgentId, WorldSnapshot> {
        self.bodies
            .keys()
            .filter_map(|id| self.snapshot(*id, tick).map(|s| (*id, s)))
            .collect()
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("arc_mind=info")),
        )
        .init();

    tracing::info!("Arc Mind starting...");

    let config = match &args.config {
        Some(path) => MindConfig::load(path)?,
        None => MindConfig::default(),
    };

    // Runtime for reasoning calls; the tick loop itself never awaits
    let rt = Runtime::new()?;

    let reasoner: Arc<dyn ReasoningService> = match LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "Reasoning through the model API");
            Arc::new(LlmReasoner::new(client, rt.handle().clone(), Duration::from_secs(args.llm_timeout)))
        }
        Err(_) => {
            tracing::warn!("LLM_API_KEY not set - replanning and skill generation run offline");
            Arc::new(OfflineReasoner)
        }
    };

    let persistence: Arc<dyn Persistence> = match &args.data_dir {
        Some(dir) => Arc::new(FileStore::new(dir.clone())),
        None => Arc::new(VolatileStore::new()),
    };

    let mut registry = AgentRegistry::new(config, reasoner, persistence)?;
    let mut world = DemoWorld::new(args.seed);
    let mut tick: Tick = 0;

    for name in ["Steve", "Alex"] {
        spawn(&mut registry, &mut world, name, args.action_ticks);
    }

    println!("\n=== ARC MIND ===");
    println!("Autonomous agents with layered decisions, memory and learned skills");
    println!();
    println!("Commands:");
    println!("  tick / t              - Advance one tick");
    println!("  run <n>               - Advance n ticks");
    println!("  spawn <name>          - Spawn an agent");
    println!("  despawn <name>        - Save and remove an agent");
    println!("  list / l              - One line per agent");
    println!("  status <name>         - Detailed agent status");
    println!("  save [name]           - Force-save one or all agents");
    println!("  reload [path]         - Reload configuration");
    println!("  ask <name> <text>     - Submit a task request");
    println!("  clear <name>          - Cancel all of an agent's goals");
    println!("  team <name> <text>    - Propose a shared goal led by <name>");
    println!("  quit / q              - Save everything and exit");
    println!();

    loop {
        print!("[tick {}] > ", tick);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();

        match command {
            "quit" | "q" => break,
            "tick" | "t" => {
                tick += 1;
                run_tick(&mut registry, &mut world, tick, true);
            }
            "run" => match rest.parse::<u32>() {
                Ok(n) => {
                    for _ in 0..n {
                        tick += 1;
                        run_tick(&mut registry, &mut world, tick, false);
                    }
                    println!("Completed {} ticks. Now at tick {}.", n, tick);
                }
                Err(_) => println!("Usage: run <number>"),
            },
            "spawn" if !rest.is_empty() => spawn(&mut registry, &mut world, rest, args.action_ticks),
            "despawn" => {
                if let Some(id) = find_agent(&registry, rest) {
                    world.remove_body(id);
                    match registry.despawn(id) {
                        Ok(()) => println!("Despawned {}", rest),
                        Err(e) => println!("Despawned {} (final save failed: {})", rest, e),
                    }
                }
            }
            "list" | "l" => {
                for status in registry.list() {
                    print_summary(&status);
                }
            }
            "status" | "s" => {
                if let Some(id) = find_agent(&registry, rest) {
                    match registry.status(id) {
                        Ok(status) => print_status(&status),
                        Err(e) => println!("{}", e),
                    }
                }
            }
            "save" if rest.is_empty() => {
                let saved = registry.force_save_all();
                println!("Saved {}/{} agents", saved, registry.len());
            }
            "save" => {
                if let Some(id) = find_agent(&registry, rest) {
                    match registry.force_save(id) {
                        Ok(()) => println!("Saved {}", rest),
                        Err(e) => println!("Save failed: {}", e),
                    }
                }
            }
            "reload" => {
                let result = match (rest, &args.config) {
                    ("", Some(path)) => registry.reload_config_file(path),
                    ("", None) => registry.reload_config(MindConfig::default()),
                    (path, _) => registry.reload_config_file(Path::new(path)),
                };
                match result {
                    Ok(()) => println!("Configuration reloaded"),
                    Err(e) => println!("Reload failed: {}", e),
                }
            }
            "ask" | "clear" | "team" => {
                let (name, text) = rest.split_once(' ').unwrap_or((rest, ""));
                let text = text.trim();
                let Some(id) = find_agent(&registry, name) else {
                    continue;
                };
                let result = match command {
                    "clear" => registry.clear_goals(id).map(|n| format!("Cancelled {} goal(s)", n)),
                    _ if text.is_empty() => Ok(format!("Usage: {} <name> <text>", command)),
                    "ask" => registry
                        .submit_request(id, "console", TaskRequest::NaturalLanguage(text.to_string()))
                        .map(|goal| format!("Queued {} for {}", goal, name)),
                    _ => {
                        let priority = registry.config().planner.requested_goal_priority;
                        let spec = TaskRequest::NaturalLanguage(text.to_string()).into_goal_spec(name, priority);
                        registry
                            .propose_team(id, spec, Vec::new())
                            .map(|team| format!("{} proposed {}", name, team))
                    }
                };
                match result {
                    Ok(message) => println!("{}", message),
                    Err(e) => println!("{}", e),
                }
            }
            _ => println!("Unknown command. Available: tick, run, spawn, despawn, list, status, save, reload, ask, clear, team, quit"),
        }
    }

    let saved = registry.shutdown();
    println!("\nGoodbye! Saved {} agent(s) after {} ticks.", saved, tick);
    Ok(())
}

fn spawn(registry: &mut AgentRegistry, world: &mut DemoWorld, name: &str, action_ticks: u32) {
    let executor = ScriptedExecutor::new(action_ticks);
    let handle = executor.handle();
    match registry.spawn(name, Box::new(executor)) {
        Ok(id) => {
            world.add_body(id, handle);
            println!("Spawned {} ({})", name, id);
        }
        Err(e) => println!("{}", e),
    }
}

/// Resolve an agent name, reporting when there is no such agent
fn find_agent(registry: &AgentRegistry, name: &str) -> Option<AgentId> {
    let found = registry.find(name);
    if found.is_none() {
        if name.is_empty() {
            println!("Missing agent name");
        } else {
            println!("No agent named {}", name);
        }
    }
    found
}

fn run_tick(registry: &mut AgentRegistry, world: &mut DemoWorld, tick: Tick, verbose: bool) {
    let snapshots = world.snapshots(tick);
    let results = registry.tick_all(tick, &snapshots);
    world.step();

    if !verbose {
        return;
    }
    for (id, events) in results {
        let name = registry.get(id).map(|b| b.name().to_string()).unwrap_or_default();
        for line in events.iter().filter_map(describe) {
            println!("  {}: {}", name, line);
        }
    }
}

/// One log line per event worth showing; routine ones are skipped
fn describe(event: &BrainEvent) -> Option<String> {
    Some(match event {
        BrainEvent::DecisionEvaluated { urgent: Some(reason), .. } => format!("urgent decision ({:?})", reason),
        BrainEvent::ReactionTriggered { reaction, intent } => format!("{:?} -> {}", reaction, intent),
        BrainEvent::IntentIssued { intent, .. } => format!("intent: {}", intent),
        BrainEvent::ActionFinished { intent, outcome, .. } => format!("{} {:?}", intent, outcome),
        BrainEvent::PlanBound { goal, skill, steps } => {
            format!("{} planned with {} ({} steps)", goal, skill.as_deref().unwrap_or("fallback"), steps)
        }
        BrainEvent::GoalFinished { goal, kind, status } => format!("{} ({:?}) {:?}", goal, kind, status),
        BrainEvent::Replan(ReplanOutcome::Requested | ReplanOutcome::Skipped) => return None,
        BrainEvent::Replan(outcome) => format!("replan: {:?}", outcome),
        BrainEvent::Learning(event) => format!("learning: {:?}", event),
        BrainEvent::Team(notice) => format!("team: {:?}", notice),
        BrainEvent::TeamJoined { team } => format!("joined {}", team),
        BrainEvent::Discovered { kind, category, position } => format!("discovered {:?} {} at {}", kind, category, position),
        BrainEvent::Saved => "saved".to_string(),
        BrainEvent::PersistenceFailed { kind, error } => format!("save of {:?} failed: {}", kind, error),
        BrainEvent::MemoryCleaned { purged, consolidated } => {
            format!("memory cleanup: {} purged, {} consolidated", purged, consolidated)
        }
        BrainEvent::ExperiencesPruned { removed } => format!("{} old experiences pruned", removed),
        BrainEvent::DecisionEvaluated { urgent: None, .. } => return None,
    })
}

fn print_summary(status: &BrainStatus) {
    let goal = status
        .active_goal
        .as_ref()
        .map(|g| format!("{} {:.0}%", g.description, g.progress * 100.0))
        .unwrap_or_else(|| "idle".to_string());
    println!(
        "  {:<10} hp {:>4.1}  goals {:>2}  skills {:>2}  places {:>3}  {}",
        status.name, status.health, status.goals, status.skills, status.known_places, goal
    );
}

fn print_status(status: &BrainStatus) {
    println!();
    println!("=== {} ({}) ===", status.name, status.id);
    println!("Tick: {}  Health: {:.1}", status.tick, status.health);
    match &status.active_goal {
        Some(goal) => println!(
            "Active goal: {} {:?} \"{}\" {:.0}% via {}",
            goal.id,
            goal.kind,
            goal.description,
            goal.progress * 100.0,
            goal.skill.as_deref().unwrap_or("fallback plan")
        ),
        None => println!("Active goal: none"),
    }
    if let Some(intent) = &status.current_intent {
        println!("Current intent: {}", intent);
    }
    println!(
        "Goals: {}  Memories: {}  Skills: {}  Known places: {}",
        status.goals, status.memories, status.skills, status.known_places
    );
    println!(
        "Reasoning outstanding: replan {}  learning {}",
        status.pending_replan, status.pending_learning
    );
    if let Some(team) = status.team {
        println!("Team: {}", team);
    }
    println!();
}
