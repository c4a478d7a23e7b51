use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::Rng;
use serde::Deserialize;
use std::error::Error;

use crate::task::{Task, TaskOptions};

static TASK_DIR: Dir = include_dir!("assets/tasks");

/// Raw task definition as it appears in the embedded JSON files.
#[derive(Debug, Clone, Deserialize)]
struct TaskDef {
    type_id: String,
    #[serde(default)]
    subtype_id: Option<String>,
    #[serde(default)]
    variant_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    code: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    level: Option<u8>,
}

impl TaskDef {
    fn into_task(self) -> Result<Task, Box<dyn Error>> {
        let task = Task::new(
            &self.type_id,
            &self.code,
            TaskOptions {
                subtype_id: self.subtype_id,
                variant_id: self.variant_id,
                title: self.title,
                tags: self.tags,
                level: self.level,
            },
        )?;
        Ok(task)
    }
}

/// Built-in snippet library, embedded at compile time and ordered
/// numerically by (type, subtype, variant).
#[derive(Debug, Clone)]
pub struct Catalog {
    tasks: Vec<Task>,
}

fn numeric(part: &str) -> u32 {
    part.parse().unwrap_or(u32::MAX)
}

fn sort_key(task: &Task) -> (u32, u32, u32) {
    (
        numeric(&task.type_id),
        numeric(&task.subtype_id),
        numeric(&task.variant_id),
    )
}

impl Catalog {
    /// Load every embedded task file. A bad built-in definition is a
    /// packaging defect, so this surfaces the error at startup.
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let mut tasks: Vec<Task> = Vec::new();
        for file in TASK_DIR.files() {
            let raw = file
                .contents_utf8()
                .ok_or_else(|| format!("task file {:?} is not utf-8", file.path()))?;
            let defs: Vec<TaskDef> = serde_json::from_str(raw)?;
            for def in defs {
                tasks.push(def.into_task()?);
            }
        }
        let tasks = tasks.into_iter().sorted_by_key(sort_key).collect();
        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Wrap-around successor, used by "next task" and auto-advance.
    pub fn next_after(&self, id: &str) -> Option<&Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.get((idx + 1) % self.tasks.len())
    }

    /// The last active task when it still exists, otherwise a random pick.
    pub fn pick_initial(&self, last_active: Option<&str>) -> Option<&Task> {
        if let Some(id) = last_active {
            if let Some(task) = self.find(id) {
                return Some(task);
            }
        }
        if self.tasks.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.tasks.len());
        self.tasks.get(idx)
    }
}
