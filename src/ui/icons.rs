//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");

// Stage indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static MODEL: Emoji<'_, '_> = Emoji("🧠 ", "[M]");
pub static PROOF: Emoji<'_, '_> = Emoji("🔐 ", "[P]");
pub static CHAIN: Emoji<'_, '_> = Emoji("⛓️  ", "[C]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
