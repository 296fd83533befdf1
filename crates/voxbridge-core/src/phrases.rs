//! Contextual filler phrases spoken while the gateway is thinking.
//!
//! Every phrase ends with a trailing space so the downstream TTS keeps a
//! clean word boundary when the real reply is appended.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

#[derive(Debug)]
pub struct PhraseCategory {
    pub name: &'static str,
    keywords: &'static [&'static str],
    initial: &'static [&'static str],
    keep_alive: &'static [&'static str],
}

static CATEGORIES: &[PhraseCategory] = &[
    PhraseCategory {
        name: "email",
        keywords: &["email", "inbox", "mail", "gmail"],
        initial: &[
            "Checking your inbox... ",
            "Pulling up your emails... ",
            "Let me look at your mail... ",
        ],
        keep_alive: &[
            "Still going through your messages... ",
            "Almost there, sorting your mail... ",
            "Just a moment, reading the rest... ",
        ],
    },
    PhraseCategory {
        name: "calendar",
        keywords: &["calendar", "schedule", "meeting", "appointment", "event"],
        initial: &[
            "Checking your calendar... ",
            "Looking at your schedule... ",
            "Pulling up your agenda... ",
        ],
        keep_alive: &[
            "Still checking your schedule... ",
            "Going through the upcoming events... ",
            "Almost done with your calendar... ",
        ],
    },
    PhraseCategory {
        name: "weather",
        keywords: &["weather", "temperature", "forecast", "rain", "sunny"],
        initial: &[
            "Checking the weather... ",
            "Let me look at the forecast... ",
            "Getting the latest conditions... ",
        ],
        keep_alive: &[
            "Still fetching the forecast... ",
            "Almost have the weather for you... ",
        ],
    },
    PhraseCategory {
        name: "messaging",
        keywords: &["message", "text", "sms", "telegram", "signal", "slack", "discord"],
        initial: &[
            "Checking your messages... ",
            "Looking at your chats... ",
            "One second, opening your messages... ",
        ],
        keep_alive: &[
            "Still going through your chats... ",
            "Almost caught up on your messages... ",
        ],
    },
    PhraseCategory {
        name: "tasks",
        keywords: &["task", "todo", "to-do", "reminder", "remind me"],
        initial: &[
            "Checking your tasks... ",
            "Looking at your list... ",
            "Pulling up your reminders... ",
        ],
        keep_alive: &[
            "Still sorting your tasks... ",
            "Nearly done with your list... ",
        ],
    },
    PhraseCategory {
        name: "health",
        keywords: &["health", "workout", "steps", "sleep", "heart rate"],
        initial: &[
            "Checking your health data... ",
            "Looking at your stats... ",
            "Pulling up your activity... ",
        ],
        keep_alive: &[
            "Still crunching your numbers... ",
            "Almost done with your health data... ",
        ],
    },
    PhraseCategory {
        name: "crypto",
        keywords: &["crypto", "bitcoin", "ethereum", "price of", "wallet", "market"],
        initial: &[
            "Checking the markets... ",
            "Looking at the prices... ",
            "Getting the latest numbers... ",
        ],
        keep_alive: &[
            "Still watching the charts... ",
            "Almost have those prices... ",
        ],
    },
    PhraseCategory {
        name: "search",
        keywords: &["search", "look up", "google", "find out", "research"],
        initial: &[
            "Searching that for you... ",
            "Looking that up... ",
            "Let me find that... ",
        ],
        keep_alive: &[
            "Still searching... ",
            "Digging a little deeper... ",
            "Almost found it... ",
        ],
    },
    PhraseCategory {
        name: "code",
        keywords: &["code", "bug", "deploy", "github", "repo", "script", "server"],
        initial: &[
            "Looking at the code... ",
            "Checking that for you... ",
            "One moment, reading through it... ",
        ],
        keep_alive: &[
            "Still working through the code... ",
            "Almost done checking... ",
        ],
    },
    PhraseCategory {
        name: "notes",
        keywords: &["note", "write down", "jot", "notebook"],
        initial: &[
            "Opening your notes... ",
            "Getting that written down... ",
            "One second, grabbing your notes... ",
        ],
        keep_alive: &[
            "Still with your notes... ",
            "Almost done writing... ",
        ],
    },
    PhraseCategory {
        name: "browser",
        keywords: &["browser", "website", "web page", "open the site", "url"],
        initial: &[
            "Opening that up... ",
            "Loading the page... ",
            "One moment, fetching the site... ",
        ],
        keep_alive: &[
            "Still loading the page... ",
            "Almost there... ",
        ],
    },
    PhraseCategory {
        name: "memory",
        keywords: &["remember", "memory", "recall", "forget", "last time"],
        initial: &[
            "Let me think back... ",
            "Checking what I remember... ",
            "One second, recalling that... ",
        ],
        keep_alive: &[
            "Still thinking back... ",
            "Almost have it... ",
        ],
    },
    PhraseCategory {
        name: "file",
        keywords: &["file", "document", "folder", "download", "pdf"],
        initial: &[
            "Looking for that file... ",
            "Checking your documents... ",
            "One moment, opening it... ",
        ],
        keep_alive: &[
            "Still going through your files... ",
            "Almost found the document... ",
        ],
    },
    PhraseCategory {
        name: "music",
        keywords: &["music", "song", "play some", "playlist", "spotify"],
        initial: &[
            "Finding that for you... ",
            "Looking through the music... ",
            "One second, queuing that up... ",
        ],
        keep_alive: &[
            "Still picking the right track... ",
            "Almost ready to play... ",
        ],
    },
    PhraseCategory {
        name: "image",
        keywords: &["image", "photo", "picture", "draw", "generate a"],
        initial: &[
            "Working on that image... ",
            "Let me put that together... ",
            "One moment, sketching it out... ",
        ],
        keep_alive: &[
            "Still rendering... ",
            "The picture is almost ready... ",
        ],
    },
    PhraseCategory {
        name: "voice",
        keywords: &["voice", "say that", "speak", "louder", "quieter"],
        initial: &[
            "Sure, adjusting that... ",
            "One moment... ",
            "Got it, changing that... ",
        ],
        keep_alive: &[
            "Still adjusting... ",
            "Almost set... ",
        ],
    },
    PhraseCategory {
        name: "whatsapp",
        keywords: &["whatsapp"],
        initial: &[
            "Checking WhatsApp... ",
            "Opening your WhatsApp chats... ",
            "One second, looking at WhatsApp... ",
        ],
        keep_alive: &[
            "Still going through WhatsApp... ",
            "Almost caught up there... ",
        ],
    },
    PhraseCategory {
        name: "twitter",
        keywords: &["twitter", "tweet", "timeline"],
        initial: &[
            "Checking the timeline... ",
            "Looking at the posts... ",
            "One moment, scrolling through... ",
        ],
        keep_alive: &[
            "Still reading the timeline... ",
            "Almost done scrolling... ",
        ],
    },
];

static FALLBACK: PhraseCategory = PhraseCategory {
    name: "fallback",
    keywords: &[],
    initial: &[
        "One moment... ",
        "Let me check... ",
        "Working on it... ",
        "On it... ",
    ],
    keep_alive: &[
        "Still working on that... ",
        "Almost done... ",
        "Hang tight, nearly there... ",
        "Just a few more seconds... ",
    ],
};

/// Last initial-phrase index handed out, process-wide. Races between
/// concurrent turns can repeat a phrase, which is only cosmetic.
static LAST_INITIAL: AtomicUsize = AtomicUsize::new(usize::MAX);

/// First category with a keyword substring hit, table order defining
/// priority; `fallback` otherwise.
pub fn match_category(text: &str) -> &'static PhraseCategory {
    let lowered = text.to_lowercase();
    CATEGORIES
        .iter()
        .find(|category| category.keywords.iter().any(|k| lowered.contains(k)))
        .unwrap_or(&FALLBACK)
}

/// Random initial phrase, never the same index as the previous pick when the
/// category has more than one phrase.
pub fn pick_initial(category: &PhraseCategory) -> &'static str {
    let len = category.initial.len();
    if len == 1 {
        LAST_INITIAL.store(0, Ordering::Relaxed);
        return category.initial[0];
    }

    let last = LAST_INITIAL.load(Ordering::Relaxed);
    let mut idx = rand::thread_rng().gen_range(0..len);
    if idx == last {
        idx = (idx + 1) % len;
    }
    LAST_INITIAL.store(idx, Ordering::Relaxed);
    category.initial[idx]
}

/// Deterministic round-robin keep-alive phrase.
pub fn pick_keep_alive(category: &PhraseCategory, counter: usize) -> &'static str {
    category.keep_alive[counter % category.keep_alive.len()]
}
