//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Job indicators
pub static PLAN: Emoji<'_, '_> = Emoji("📝 ", "[PLAN]");
pub static BLOCKER: Emoji<'_, '_> = Emoji("🚧 ", "[BLOCK]");
pub static RESUME: Emoji<'_, '_> = Emoji("🔄 ", "[RESUME]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "[STOP]");
