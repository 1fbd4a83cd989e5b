use std::collections::HashMap;
use airport_shared::TicketRequest;

/// Finds the first request that repeats an earlier `(row, seat, flight)`.
/// Returns `(index, first_index)`.
pub fn find_duplicate(requests: &[TicketRequest]) -> Option<(usize, usize)> {
    let mut seen: HashMap<TicketRequest, usize> = HashMap::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        if let Some(&first_index) = seen.get(request) {
            return Some((index, first_index));
        }
        seen.insert(*request, index);
    }
    None
}
