//! Reference tool handlers exercising the interaction engine end to end.
//! These are demonstration tools, not part of the engine's public surface —
//! a real deployment registers its own [`mcpi_engine::ToolHandler`]
//! implementations the same way.

mod age;
mod color;
mod greet;

pub use age::AgeCheck;
pub use color::ColorPick;
pub use greet::Greet;

use std::sync::Arc;

use mcpi_engine::ToolRegistry;

/// Registers the reference tools used by the end-to-end scenarios.
pub fn register_reference_tools(registry: &ToolRegistry) -> mcpi_engine::Result<()> {
    registry.register(mcpi_engine::Tool {
        name: "greet".into(),
        description: "Asks for a name and returns a greeting.".into(),
        handler: Arc::new(Greet),
    })?;
    registry.register(mcpi_engine::Tool {
        name: "age_check".into(),
        description: "Asks for an age between 18 and 120 and verifies it.".into(),
        handler: Arc::new(AgeCheck),
    })?;
    registry.register(mcpi_engine::Tool {
        name: "color_pick".into(),
        description: "Asks the caller to choose red, blue, or green.".into(),
        handler: Arc::new(ColorPick),
    })?;
    Ok(())
}
