use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    #[default]
    Inside,
    Outside,
}

/// The listener's toggles.  Every combination is valid; `window_open` only
/// matters inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub location: Location,
    pub window_open: bool,
    pub raining: bool,
}

/// Row of the parameter table an environment selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scene {
    InsideWindowShut,
    InsideWindowOpen,
    Outside,
}

impl Environment {
    pub fn new(location: Location, window_open: bool, raining: bool) -> Self {
        Self {
            location,
            window_open,
            raining,
        }
    }

    pub fn scene(&self) -> Scene {
        match (self.location, self.window_open) {
            (Location::Outside, _) => Scene::Outside,
            (Location::Inside, true) => Scene::InsideWindowOpen,
            (Location::Inside, false) => Scene::InsideWindowShut,
        }
    }

    pub fn is_outside(&self) -> bool {
        self.location == Location::Outside
    }
}
