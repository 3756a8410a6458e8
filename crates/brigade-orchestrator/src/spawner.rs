use crate::agent::{Agent, Placement};
use crate::config::KitchenConfig;
use crate::menu::{station_equipment, station_skills};
use crate::messages::Inbound;
use crate::order::MenuItem;
use crate::profiles::profile_for;
use crate::types::{AgentId, AgentRole};
use brigade_agent::LlmBackend;
use brigade_core::{BrigadeError, BrigadeResult};
use brigade_memory::{AgentMemory, Embedder, FileVectorStore, LocalEmbedding, SignificancePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// A request to bring a new agent into the kitchen.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Display name, unique within a run.
    pub name: String,
    pub role: AgentRole,
    pub placement: Placement,
}

/// A freshly built agent and the sender feeding its inbox.
pub type Spawned = (Agent, UnboundedSender<Inbound>);

/// Builds agents that share one backend and one embedder, each with its own
/// memory.
pub struct AgentSpawner {
    backend: Arc<dyn LlmBackend>,
    embedder: Arc<dyn Embedder>,
    significance: SignificancePolicy,
    menu: Vec<MenuItem>,
    /// When set, long-term memory of each agent goes to `<dir>/<name>.jsonl`.
    memory_dir: Option<PathBuf>,
}

impl AgentSpawner {
    pub fn new(backend: Arc<dyn LlmBackend>, config: &KitchenConfig, menu: Vec<MenuItem>) -> Self {
        Self {
            backend,
            embedder: Arc::new(LocalEmbedding::new(config.agents.embedding_dimension)),
            significance: config.significance.clone(),
            menu,
            memory_dir: None,
        }
    }

    /// Persist long-term memory under `dir`.
    pub fn with_memory_dir(mut self, dir: PathBuf) -> Self {
        self.memory_dir = Some(dir);
        self
    }

    /// Build one agent.
    ///
    /// Everyone but the executive chef needs a supervisor.
    pub async fn spawn(&self, request: SpawnRequest) -> BrigadeResult<Spawned> {
        if request.role != AgentRole::ExecutiveChef && request.placement.supervisor.is_none() {
            return Err(BrigadeError::Config(format!(
                "{} ({}) has no supervisor",
                request.name, request.role
            )));
        }
        let memory = match &self.memory_dir {
            Some(dir) => {
                let file = dir.join(format!("{}.jsonl", file_stem(&request.name)));
                let store = FileVectorStore::open(file).await?;
                AgentMemory::with_store(
                    Box::new(store),
                    self.embedder.clone(),
                    self.significance.clone(),
                )
            }
            None => AgentMemory::new(self.embedder.clone(), self.significance.clone()),
        };
        debug!(name = %request.name, role = %request.role, "Spawning agent");
        Ok(Agent::new(
            request.name,
            &profile_for(request.role),
            request.placement,
            memory,
            self.backend.clone(),
        ))
    }

    /// Placement at `station` with the skills and equipment its dishes use.
    pub fn station_placement(&self, station: &str, supervisor: AgentId) -> Placement {
        Placement {
            station: Some(station.to_string()),
            supervisor: Some(supervisor),
            skills: station_skills(&self.menu, station),
            equipment: station_equipment(&self.menu, station),
        }
    }

    /// The full brigade: an executive chef, a sous chef and a chef de partie
    /// per station, and `staff_count` execution staff cycling line cook,
    /// prep cook and porter across the stations.
    pub async fn brigade(&self, stations: &[String], staff_count: usize) -> BrigadeResult<Vec<Spawned>> {
        if stations.is_empty() {
            return Err(BrigadeError::Config("a brigade needs a station".into()));
        }
        let mut agents = Vec::with_capacity(1 + stations.len() * 2 + staff_count);

        let chef = self
            .spawn(SpawnRequest {
                name: "Executive Chef".into(),
                role: AgentRole::ExecutiveChef,
                placement: Placement::default(),
            })
            .await?;
        let chef_id = chef.0.id();
        agents.push(chef);

        let mut leads = Vec::with_capacity(stations.len());
        for station in stations {
            let sous = self
                .spawn(SpawnRequest {
                    name: format!("Sous Chef ({station})"),
                    role: AgentRole::SousChef,
                    placement: Placement {
                        station: Some(station.clone()),
                        supervisor: Some(chef_id),
                        ..Placement::default()
                    },
                })
                .await?;
            let lead = self
                .spawn(SpawnRequest {
                    name: format!("Chef de Partie ({station})"),
                    role: AgentRole::ChefDePartie,
                    placement: self.station_placement(station, sous.0.id()),
                })
                .await?;
            leads.push(lead.0.id());
            agents.push(sous);
            agents.push(lead);
        }

        const ROTATION: [AgentRole; 3] = [
            AgentRole::LineCook,
            AgentRole::PrepCook,
            AgentRole::KitchenPorter,
        ];
        for i in 0..staff_count {
            let role = ROTATION[i % ROTATION.len()];
            let slot = i % stations.len();
            let member = self
                .spawn(SpawnRequest {
                    name: format!("{} {}", role_title(role), i + 1),
                    role,
                    placement: self.station_placement(&stations[slot], leads[slot]),
                })
                .await?;
            agents.push(member);
        }
        Ok(agents)
    }
}

/// Title used in agent names.
pub fn role_title(role: AgentRole) -> &'static str {
    match role {
        AgentRole::ExecutiveChef => "Executive Chef",
        AgentRole::SousChef => "Sous Chef",
        AgentRole::ChefDePartie => "Chef de Partie",
        AgentRole::LineCook => "Line Cook",
        AgentRole::PrepCook => "Prep Cook",
        AgentRole::KitchenPorter => "Kitchen Porter",
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::menu::default_menu;
    use brigade_agent::ScriptedBackend;

    fn spawner() -> AgentSpawner {
        let backend = Arc::new(ScriptedBackend::always(Ok("ok".into())));
        AgentSpawner::new(backend, &KitchenConfig::default(), default_menu())
    }

    fn stations() -> Vec<String> {
        vec!["grill".into(), "pastry".into()]
    }

    #[tokio::test]
    async fn test_brigade_shape() {
        let agents = spawner().brigade(&stations(), 5).await.unwrap();
        assert_eq!(agents.len(), 1 + 2 * 2 + 5);

        let count = |role| agents.iter().filter(|(a, _)| a.role() == role).count();
        assert_eq!(count(AgentRole::ExecutiveChef), 1);
        assert_eq!(count(AgentRole::SousChef), 2);
        assert_eq!(count(AgentRole::ChefDePartie), 2);
        assert_eq!(count(AgentRole::LineCook), 2);
        assert_eq!(count(AgentRole::PrepCook), 2);
        assert_eq!(count(AgentRole::KitchenPorter), 1);
    }

    #[tokio::test]
    async fn test_leaves_report_to_their_station_lead() {
        let agents = spawner().brigade(&stations(), 4).await.unwrap();
        let lead_of = |station: &str| {
            agents
                .iter()
                .find(|(a, _)| {
                    a.role() == AgentRole::ChefDePartie && a.card().station.as_deref() == Some(station)
                })
                .map(|(a, _)| a.id())
                .unwrap()
        };
        for (agent, _) in agents.iter().filter(|(a, _)| a.role().is_execution_level()) {
            let station = agent.card().station.clone().unwrap();
            assert_eq!(agent.card().supervisor, Some(lead_of(&station)));
        }
        let cook = &agents
            .iter()
            .find(|(a, _)| a.card().name == "Line Cook 1")
            .unwrap()
            .0;
        let profile = cook.profile(&KitchenConfig::default()).await;
        assert!(profile.skills.contains("grilling"));
        assert!(profile.equipment.contains("grill"));
    }

    #[tokio::test]
    async fn test_unsupervised_staff_rejected() {
        let result = spawner()
            .spawn(SpawnRequest {
                name: "Line Cook 9".into(),
                role: AgentRole::LineCook,
                placement: Placement::default(),
            })
            .await;
        assert!(result.is_err());
        assert!(spawner().brigade(&[], 3).await.is_err());
    }

    #[tokio::test]
    async fn test_file_backed_memory() {
        let dir = tempfile::tempdir().unwrap();
        let spawner = spawner().with_memory_dir(dir.path().to_path_buf());
        let agents = spawner.brigade(&stations(), 0).await.unwrap();
        assert_eq!(agents.len(), 5);
        assert_eq!(file_stem("Sous Chef (grill)"), "sous_chef__grill_");
    }
}
