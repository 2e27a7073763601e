//! A builder pattern implementation for constructing an [`Autopilot`] over a
//! concrete layout.
//!
//! The [`AutopilotBuilder`] provides a fluent interface to configure and
//! assemble the engine's collaborators: the layout store, the command
//! station, the track view and the route chooser.
//!
//! ## Key Design Points
//! - **Default Components**: Initializes with in-process defaults (in-memory layout store, loopback
//!   simulation station).
//! - **Customization**: Allows overriding defaults via setter methods (e.g., `layout()`,
//!   `station()`).
//! - **Lifecycle Management**:
//!   - `build()`: Assembles the [`Autopilot`] and spawns the sensor feed pump.
//!   - `ready()`: Finalizes construction and returns the initialized [`Autopilot`].
//!
//! ## Example
//! ```ignore
//! let pilot = AutopilotBuilder::new(None)
//!     .layout(my_layout)  // Optional override
//!     .build()
//!     .ready()?;
//! pilot.start(&loco_id).await?;
//! ```

use std::sync::Arc;

use tracing::error;
use tracing::info;

use super::Autopilot;
use crate::alias::CSOF;
use crate::alias::LSOF;
use crate::alias::RCOF;
use crate::alias::TVOF;
use crate::config::Settings;
use crate::errors::Error;
use crate::MemoryLayoutStore;
use crate::NoopView;
use crate::RailTypeConfig;
use crate::RandomChooser;
use crate::Result;
use crate::SimStation;

pub struct AutopilotBuilder {
    pub(super) settings: Settings,
    pub(super) layout: Option<Arc<LSOF<RailTypeConfig>>>,
    pub(super) station: Option<Arc<CSOF<RailTypeConfig>>>,
    pub(super) view: Option<Arc<TVOF<RailTypeConfig>>>,
    pub(super) chooser: Option<Arc<RCOF<RailTypeConfig>>>,

    pub(super) autopilot: Option<Arc<Autopilot<RailTypeConfig>>>,
}

impl AutopilotBuilder {
    /// Creates a new AutopilotBuilder with settings loaded from file and
    /// environment.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a layout-specific configuration
    ///
    /// # Panics
    /// Will panic if configuration loading fails (consider returning Result
    /// instead)
    pub fn new(config_path: Option<&str>) -> Self {
        let settings = Settings::load(config_path).expect("Load settings successfully");
        Self::from_settings(settings)
    }

    /// Constructs AutopilotBuilder from in-memory settings
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            settings,
            layout: None,
            station: None,
            view: None,
            chooser: None,
            autopilot: None,
        }
    }

    /// Sets a custom layout store implementation
    pub fn layout(
        mut self,
        layout: Arc<LSOF<RailTypeConfig>>,
    ) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Sets a custom command station implementation
    pub fn station(
        mut self,
        station: Arc<CSOF<RailTypeConfig>>,
    ) -> Self {
        self.station = Some(station);
        self
    }

    /// Sets a custom track view implementation
    pub fn view(
        mut self,
        view: Arc<TVOF<RailTypeConfig>>,
    ) -> Self {
        self.view = Some(view);
        self
    }

    /// Sets a custom route chooser implementation
    pub fn chooser(
        mut self,
        chooser: Arc<RCOF<RailTypeConfig>>,
    ) -> Self {
        self.chooser = Some(chooser);
        self
    }

    /// Replaces the entire settings tree
    pub fn settings(
        mut self,
        settings: Settings,
    ) -> Self {
        self.settings = settings;
        self
    }

    /// Finalizes the builder and constructs the autopilot instance.
    ///
    /// Initializes default implementations for any unconfigured components:
    /// - An empty in-memory layout store
    /// - A loopback simulation command station
    /// - The no-op track view and uniform random route choice
    ///
    /// Also spawns the sensor feed pump, so dispatchers started from the
    /// returned handle receive feedback immediately.
    pub fn build(mut self) -> Self {
        let layout = self
            .layout
            .take()
            .unwrap_or_else(|| Arc::new(MemoryLayoutStore::new()));
        let station = self
            .station
            .take()
            .unwrap_or_else(|| Arc::new(SimStation::new(&self.settings.station)));
        let view = self.view.take().unwrap_or_else(|| Arc::new(NoopView));
        let chooser = self.chooser.take().unwrap_or_else(|| Arc::new(RandomChooser));

        let autopilot = Arc::new(Autopilot::<RailTypeConfig>::new(
            layout,
            station,
            view,
            chooser,
            self.settings.autopilot.clone(),
        ));
        self.enable_feedback_pump(autopilot.clone());

        self.autopilot = Some(autopilot);
        self
    }

    /// Feeds every sensor transition from the command station into the
    /// router until shutdown.
    fn enable_feedback_pump(
        &self,
        autopilot: Arc<Autopilot<RailTypeConfig>>,
    ) {
        tokio::spawn(async move {
            match autopilot.run().await {
                Ok(_) => {
                    info!("feedback pump exit");
                }
                Err(e) => {
                    error!(error = %e, "feedback pump exit with unexpected error");
                }
            }
        });
    }

    /// Returns the built autopilot instance after successful construction.
    ///
    /// # Errors
    /// Returns `Error::Fatal` if build hasn't completed
    pub fn ready(self) -> Result<Arc<Autopilot<RailTypeConfig>>> {
        self.autopilot
            .ok_or_else(|| Error::Fatal("check autopilot ready failed".to_string()))
    }
}
