/// Result reported for a well-terminated identifier that matches no
/// registered field name.
pub const UNKNOWN_FIELD: i32 = -1;

const UNKNOWN: u32 = 0;
const UNKNOWN_FINAL: u32 = 1;
const ROOT: u32 = 2;

#[derive(Clone)]
struct Node {
    terminal: bool,
    result: i32,
    next: [u32; 256],
}

/// Precompiled state machine mapping quoted field names to small ids.
///
/// The machine is driven from the byte after the opening quote. Registered
/// names terminate on their closing quote with the registration index;
/// everything else drains through the `UNKNOWN` sink, which loops on every
/// byte except `"` and then terminates with [`UNKNOWN_FIELD`]. Nodes are
/// never mutated after construction, so a built trie can be shared across
/// threads freely.
pub struct FieldTrie {
    nodes: Vec<Node>,
}

impl FieldTrie {
    pub fn new(ids: &[&str]) -> FieldTrie {
        // The sink loops on anything but the closing quote. Fresh intermediate
        // nodes start from the same layout.
        let mut template = Node {
            terminal: false,
            result: UNKNOWN_FIELD,
            next: [UNKNOWN; 256],
        };
        template.next[b'"' as usize] = UNKNOWN_FINAL;

        let mut nodes = Vec::with_capacity(3 + ids.iter().map(|id| id.len() + 1).sum::<usize>());
        nodes.push(template.clone()); // UNKNOWN
        nodes.push(Node {
            terminal: true,
            result: UNKNOWN_FIELD,
            next: [UNKNOWN; 256],
        }); // UNKNOWN_FINAL
        nodes.push(template.clone()); // ROOT

        let mut trie = FieldTrie { nodes };
        for (index, id) in ids.iter().enumerate() {
            let mut current = ROOT;
            for &byte in id.as_bytes() {
                if trie.nodes[current as usize].next[byte as usize] == UNKNOWN {
                    let fresh = trie.nodes.len() as u32;
                    trie.nodes.push(template.clone());
                    trie.nodes[current as usize].next[byte as usize] = fresh;
                }
                current = trie.nodes[current as usize].next[byte as usize];
            }
            let terminal = trie.nodes.len() as u32;
            trie.nodes.push(Node {
                terminal: true,
                result: index as i32,
                next: [UNKNOWN; 256],
            });
            trie.nodes[current as usize].next[b'"' as usize] = terminal;
        }
        trie
    }

    pub(crate) fn root(&self) -> u32 {
        ROOT
    }

    pub(crate) fn step(&self, state: u32, byte: u8) -> u32 {
        self.nodes[state as usize].next[byte as usize]
    }

    pub(crate) fn is_terminal(&self, state: u32) -> bool {
        self.nodes[state as usize].terminal
    }

    pub(crate) fn result(&self, state: u32) -> i32 {
        self.nodes[state as usize].result
    }
}
