// ── ZBot Engine: Demo Responder ────────────────────────────────────────────
// Local fallback used whenever no live transport is available. Produces a
// plausible canned reply so the turn-taking rhythm survives a dead backend.
// Stateless — nothing is retained between calls. The simulated latency is
// the manager's concern, not this module's.

use rand::Rng;

/// Canned reply templates. `{}` in the first entry is replaced with the
/// user's text verbatim.
const TEMPLATES: [&str; 4] = [
    "I understand you said: \"{}\". This is a demo response since the server isn't connected.",
    "Thanks for your message! I'm currently in demo mode. Please check your backend connection.",
    "Interesting question! Unfortunately, I can't provide a real AI response without the backend server running.",
    "I received your message, but I'm running in offline mode. Please start the ZBot backend to get AI responses.",
];

/// Produce one demo reply for `user_text`, chosen uniformly at random.
pub fn respond(user_text: &str) -> String {
    let template = TEMPLATES[rand::rng().random_range(0..TEMPLATES.len())];
    template.replace("{}", user_text)
}

// ── Tests ──────────────────────────────────────────────────────────────────
