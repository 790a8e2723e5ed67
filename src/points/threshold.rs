use crate::action::Action;

/// Direction a score moved across a threshold level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crossing {
    Ascending,
    Descending,
}

/// A named score level with actions for each crossing direction.
#[derive(Debug, Clone)]
pub struct Threshold {
    name: String,
    level: f64,
    ascending: Vec<Action>,
    descending: Vec<Action>,
}

impl Threshold {
    pub fn new(name: impl Into<String>, level: f64, ascending: Vec<Action>, descending: Vec<Action>) -> Self {
        Threshold { name: name.into(), level, ascending, descending }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn actions(&self, crossing: Crossing) -> &[Action] {
        match crossing {
            Crossing::Ascending => &self.ascending,
            Crossing::Descending => &self.descending,
        }
    }
}
