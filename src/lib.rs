//! Circuit Racer - Driving simulation core and Tauri backend
//!
//! The `game_server` module is plain Rust and usable headless. The `desktop`
//! feature adds the Tauri commands the frontend calls every frame.

pub mod game_server;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::game_server::ai::PolicyKind;
    use crate::game_server::config::RaceConfig;
    use crate::game_server::geometry::Point;
    use crate::game_server::race::{RaceEvent, RaceResult, RaceSnapshot};
    use crate::game_server::simulation::{GameServer, GameState, ServerStats};
    use crate::game_server::vehicle::PlayerInput;
    use std::sync::Mutex;
    use tauri::State;

    /// Initialize a new race, optionally from a JSON config document
    #[tauri::command]
    fn init_race(
        server: State<'_, Mutex<GameServer>>,
        config: Option<String>,
        seed: Option<u64>,
    ) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;

        let mut config = match config {
            Some(json) => RaceConfig::from_json_str(&json).map_err(|e| e.to_string())?,
            None => RaceConfig::default(),
        };
        if let Some(seed) = seed {
            config.seed = seed;
        }

        server.init_race(config).map_err(|e| e.to_string())
    }

    /// Start the race countdown
    #[tauri::command]
    fn start_race(server: State<'_, Mutex<GameServer>>) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server.start_race().map_err(|e| e.to_string())
    }

    /// Perform a simulation tick with the player's held keys
    #[tauri::command]
    fn tick(
        server: State<'_, Mutex<GameServer>>,
        input: Option<PlayerInput>,
    ) -> Result<Option<RaceSnapshot>, String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.tick(input.unwrap_or_default()))
    }

    /// Get current race snapshot without advancing simulation
    #[tauri::command]
    fn get_snapshot(server: State<'_, Mutex<GameServer>>) -> Result<Option<RaceSnapshot>, String> {
        let server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.get_snapshot())
    }

    #[tauri::command]
    fn get_racing_line(server: State<'_, Mutex<GameServer>>) -> Result<Option<Vec<Point>>, String> {
        let server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.get_racing_line())
    }

    /// Get race results
    #[tauri::command]
    fn get_results(server: State<'_, Mutex<GameServer>>) -> Result<Option<Vec<RaceResult>>, String> {
        let server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.get_results())
    }

    /// Lap, checkpoint and collision notifications since the last call
    #[tauri::command]
    fn drain_events(server: State<'_, Mutex<GameServer>>) -> Result<Vec<RaceEvent>, String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.drain_events())
    }

    /// Switch an opponent between basic and enhanced AI
    #[tauri::command]
    fn toggle_ai_type(
        server: State<'_, Mutex<GameServer>>,
        index: Option<usize>,
    ) -> Result<PolicyKind, String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server
            .toggle_ai_type(index.unwrap_or(0))
            .map_err(|e| e.to_string())
    }

    #[tauri::command]
    fn set_ai_policy(
        server: State<'_, Mutex<GameServer>>,
        index: usize,
        policy: PolicyKind,
    ) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server
            .set_ai_policy(index, policy)
            .map_err(|e| e.to_string())
    }

    /// Get server statistics
    #[tauri::command]
    fn get_stats(server: State<'_, Mutex<GameServer>>) -> Result<ServerStats, String> {
        let server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.get_stats())
    }

    /// Get current game state
    #[tauri::command]
    fn get_game_state(server: State<'_, Mutex<GameServer>>) -> Result<GameState, String> {
        let server = server.lock().map_err(|e| e.to_string())?;
        Ok(server.get_state())
    }

    /// Pause the simulation
    #[tauri::command]
    fn pause_race(server: State<'_, Mutex<GameServer>>) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server.pause();
        log::info!("Race paused");
        Ok(())
    }

    /// Resume the simulation
    #[tauri::command]
    fn resume_race(server: State<'_, Mutex<GameServer>>) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server.resume();
        log::info!("Race resumed");
        Ok(())
    }

    /// Reset to idle state
    #[tauri::command]
    fn reset_race(server: State<'_, Mutex<GameServer>>) -> Result<(), String> {
        let mut server = server.lock().map_err(|e| e.to_string())?;
        server.reset();
        Ok(())
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        tauri::Builder::default()
            .manage(Mutex::new(GameServer::new()))
            .setup(|app| {
                if cfg!(debug_assertions) {
                    app.handle().plugin(
                        tauri_plugin_log::Builder::default()
                            .level(log::LevelFilter::Info)
                            .build(),
                    )?;
                }
                log::info!("Circuit Racer game server initialized");
                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                init_race,
                start_race,
                tick,
                get_snapshot,
                get_racing_line,
                get_results,
                drain_events,
                toggle_ai_type,
                set_ai_policy,
                get_stats,
                get_game_state,
                pause_race,
                resume_race,
                reset_race,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

#[cfg(feature = "desktop")]
pub use desktop::run;
