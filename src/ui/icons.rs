//! Shared UI icons.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static PENDING: Emoji<'_, '_> = Emoji("⏳ ", "[..]");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "[STOP]");

// Response sections
pub static QUESTION: Emoji<'_, '_> = Emoji("❓ ", "?");
pub static OPTION: Emoji<'_, '_> = Emoji("🔀 ", "[ALT]");
pub static HINT: Emoji<'_, '_> = Emoji("💡 ", "[REC]");
pub static DOC: Emoji<'_, '_> = Emoji("📝 ", "[DOC]");
pub static PROGRESS: Emoji<'_, '_> = Emoji("📊 ", "[PROG]");
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
