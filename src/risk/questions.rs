//! Guiding questions handed to the reviewer per focus area.

const SECURITY: [&str; 3] = [
    "Are all inputs validated and outputs encoded before use?",
    "Can any path bypass authentication or authorization checks?",
    "Are secrets, tokens, or credentials exposed in logs, errors, or responses?",
];

const ARCHITECTURE: [&str; 3] = [
    "Does the change respect existing module boundaries and layering?",
    "Does it introduce new coupling that will be hard to undo?",
    "Is the new abstraction justified by more than one caller?",
];

const DATA_INTEGRITY: [&str; 3] = [
    "Is the migration reversible, and is there a rollback plan?",
    "Can concurrent writes leave records in an inconsistent state?",
    "Are constraints and defaults correct for existing rows?",
];

const BUSINESS_LOGIC: [&str; 3] = [
    "Do the rules match the documented product requirements?",
    "Are boundary cases (zero, negative, empty, maximum) handled?",
    "Could the change alter billing, ordering, or other user-visible outcomes?",
];

const API: [&str; 3] = [
    "Is the change backward compatible for existing consumers?",
    "Are error responses and status codes consistent with the rest of the API?",
    "Is the contract documented and versioned where needed?",
];

const UX: [&str; 3] = [
    "Does the UI behave correctly on empty, loading, and error states?",
    "Is the change accessible (keyboard, screen reader, contrast)?",
    "Is the copy clear and consistent with the rest of the product?",
];

const CONFIGURATION: [&str; 3] = [
    "Are new settings documented with safe defaults?",
    "Does the change differ correctly between environments?",
    "Could a missing or malformed value break startup?",
];

const PERFORMANCE: [&str; 3] = [
    "Does the change add work inside hot loops or request paths?",
    "Are queries bounded and indexed?",
    "Is memory growth bounded under large inputs?",
];

const FRAMEWORK_INTERNAL: [&str; 3] = [
    "Does the change rely on undocumented framework behavior?",
    "Will it survive a framework upgrade?",
    "Are lifecycle hooks and middleware ordering preserved?",
];

const CODE_QUALITY: [&str; 3] = [
    "Have the automated review findings been addressed or justified?",
    "Is the code readable without the reviewer's context?",
    "Is new logic covered by meaningful tests?",
];

const GENERIC: [&str; 2] = [
    "Is the change correct for the cases it is meant to handle?",
    "Is the change covered by tests?",
];

/// Questions for a focus area name. Unknown areas get two generic questions.
pub fn review_questions(area: &str) -> Vec<String> {
    let questions: &[&str] = match area {
        "security" => &SECURITY,
        "architecture" => &ARCHITECTURE,
        "data-integrity" => &DATA_INTEGRITY,
        "business-logic" => &BUSINESS_LOGIC,
        "api" => &API,
        "ux" => &UX,
        "configuration" => &CONFIGURATION,
        "performance" => &PERFORMANCE,
        "framework-internal" => &FRAMEWORK_INTERNAL,
        "code-quality" => &CODE_QUALITY,
        _ => &GENERIC,
    };
    questions.iter().map(|q| q.to_string()).collect()
}
