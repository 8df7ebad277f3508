use std::collections::HashMap;

use strings_schemas::{ClientString, ClientThread, Thread, ThreadString};
use uuid::Uuid;

/// True if the client snapshot differs from the server snapshot in any
/// client-editable content. Versions, timestamps and lifecycle flags are
/// server-managed and never compared.
///
/// A `false` result is what lets an unchanged resubmission write zero rows.
pub fn diff(server: &Thread, client: &ClientThread) -> bool {
    thread_differs(server, client) || strings_differ(&server.strings, &client.strings)
}

/// Thread-only fields: just the name.
pub fn thread_differs(server: &Thread, client: &ClientThread) -> bool {
    server.name != client.name
}

/// String sets differ when the client has more or fewer strings, references
/// a string the server doesn't have, omits one it does, or changes the
/// name/order of a shared one.
pub fn strings_differ(server: &[ThreadString], client: &[ClientString]) -> bool {
    if server.len() != client.len() {
        return true;
    }

    let by_id: HashMap<Uuid, &ClientString> = client
        .iter()
        .filter_map(|c| c.string_id.map(|id| (id, c)))
        .collect();

    // New (id-less) or duplicated client entries.
    if by_id.len() != client.len() {
        return true;
    }

    server.iter().any(|s| match by_id.get(&s.string_id) {
        Some(c) => s.content_differs(&c.name, c.order),
        None => true,
    })
}
