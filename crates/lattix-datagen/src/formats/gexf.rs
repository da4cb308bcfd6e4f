//! GEXF export of a generated dataset, for Gephi and similar viewers.
//!
//! Nodes are entities. Every positive and negative of every split becomes
//! one directed edge with three attributes: `label` (the relation),
//! `positive` and `split`.

use crate::split::{SplitKind, Splits};
use crate::{EntityId, Result, Triple};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::io::Write;

/// GEXF 1.3 writer.
pub struct Gexf;

struct EdgeInfo<'a> {
    relation: &'a str,
    positive: bool,
    split: SplitKind,
}

const SPLITS: [SplitKind; 3] = [SplitKind::Train, SplitKind::Test, SplitKind::Validation];

impl Gexf {
    pub fn write<W: Write>(splits: &Splits, writer: W) -> Result<()> {
        let graph = dataset_graph(splits);
        let mut xml = Writer::new_with_indent(writer, b' ', 2);

        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        xml.write_event(Event::Start(
            BytesStart::new("gexf")
                .with_attributes([("xmlns", "http://gexf.net/1.3"), ("version", "1.3")]),
        ))?;
        xml.write_event(Event::Start(
            BytesStart::new("graph")
                .with_attributes([("mode", "static"), ("defaultedgetype", "directed")]),
        ))?;

        xml.write_event(Event::Start(
            BytesStart::new("attributes").with_attributes([("class", "edge")]),
        ))?;
        for (id, title, kind) in [
            ("0", "label", "string"),
            ("1", "positive", "boolean"),
            ("2", "split", "string"),
        ] {
            xml.write_event(Event::Empty(
                BytesStart::new("attribute")
                    .with_attributes([("id", id), ("title", title), ("type", kind)]),
            ))?;
        }
        xml.write_event(Event::End(BytesEnd::new("attributes")))?;

        xml.write_event(Event::Start(BytesStart::new("nodes")))?;
        for idx in graph.node_indices() {
            let id = format!("n{}", idx.index());
            let label = xml_text(graph[idx].as_str());
            xml.write_event(Event::Empty(
                BytesStart::new("node")
                    .with_attributes([("id", id.as_str()), ("label", label.as_str())]),
            ))?;
        }
        xml.write_event(Event::End(BytesEnd::new("nodes")))?;

        xml.write_event(Event::Start(BytesStart::new("edges")))?;
        for edge in graph.edge_references() {
            let info = edge.weight();
            let id = format!("e{}", edge.id().index());
            let source = format!("n{}", edge.source().index());
            let target = format!("n{}", edge.target().index());
            let label = xml_text(info.relation);
            xml.write_event(Event::Start(BytesStart::new("edge").with_attributes([
                ("id", id.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("label", label.as_str()),
            ])))?;
            xml.write_event(Event::Start(BytesStart::new("attvalues")))?;
            let positive = info.positive.to_string();
            let split = info.split.to_string();
            for (key, value) in [
                ("0", label.as_str()),
                ("1", positive.as_str()),
                ("2", split.as_str()),
            ] {
                xml.write_event(Event::Empty(
                    BytesStart::new("attvalue").with_attributes([("for", key), ("value", value)]),
                ))?;
            }
            xml.write_event(Event::End(BytesEnd::new("attvalues")))?;
            xml.write_event(Event::End(BytesEnd::new("edge")))?;
        }
        xml.write_event(Event::End(BytesEnd::new("edges")))?;

        xml.write_event(Event::End(BytesEnd::new("graph")))?;
        xml.write_event(Event::End(BytesEnd::new("gexf")))?;
        xml.into_inner().flush()?;
        Ok(())
    }
}

/// Drop characters XML 1.0 cannot carry, even escaped.
fn xml_text(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            matches!(c,
                '\t' | '\n' | '\r'
                | '\u{20}'..='\u{D7FF}'
                | '\u{E000}'..='\u{FFFD}'
                | '\u{10000}'..='\u{10FFFF}')
        })
        .collect()
}

/// Nodes in entity label order, edges split by split, positives first.
fn dataset_graph(splits: &Splits) -> DiGraph<&EntityId, EdgeInfo<'_>> {
    let edges: Vec<(&Triple, bool, SplitKind)> = SPLITS
        .iter()
        .flat_map(move |&kind| {
            let set = splits.get(kind);
            set.positives
                .iter()
                .map(move |t| (t, true, kind))
                .chain(set.negatives.iter().map(move |t| (t, false, kind)))
        })
        .collect();

    let mut nodes: BTreeMap<&EntityId, NodeIndex> = BTreeMap::new();
    for (t, _, _) in &edges {
        nodes.insert(&t.source, NodeIndex::end());
        nodes.insert(&t.target, NodeIndex::end());
    }

    let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
    for (entity, idx) in nodes.iter_mut() {
        *idx = graph.add_node(*entity);
    }
    for (t, positive, split) in edges {
        graph.add_edge(
            nodes[&t.source],
            nodes[&t.target],
            EdgeInfo {
                relation: t.relation.as_str(),
                positive,
                split,
            },
        );
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::SplitSet;

    #[test]
    fn test_gexf_contains_every_edge() {
        let splits = Splits {
            train: SplitSet {
                positives: vec![Triple::new("knows", "a", "b"), Triple::new("knows", "b", "c")],
                negatives: vec![],
            },
            test: SplitSet {
                positives: vec![Triple::new("knows", "a", "c")],
                negatives: vec![Triple::new("knows", "c", "a")],
            },
            validation: SplitSet::default(),
        };
        let mut out = Vec::new();
        Gexf::write(&splits, &mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert_eq!(xml.matches("<node ").count(), 3);
        assert_eq!(xml.matches("<edge ").count(), 4);
        assert!(xml.contains(r#"<attvalue for="1" value="false"/>"#));
        assert!(xml.contains(r#"<attvalue for="2" value="test"/>"#));
    }

    #[test]
    fn test_labels_are_escaped() {
        let splits = Splits {
            train: SplitSet {
                positives: vec![Triple::new("a<b>&\"c\"", "x\u{1}y", "z")],
                negatives: vec![],
            },
            ..Splits::default()
        };
        let mut out = Vec::new();
        Gexf::write(&splits, &mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains(r#"label="a&lt;b&gt;&amp;&quot;c&quot;""#));
        assert!(xml.contains(r#"label="xy""#));
        assert!(!xml.contains('\u{1}'));
    }

    #[test]
    fn test_document_is_well_formed() {
        let splits = Splits {
            test: SplitSet {
                positives: vec![Triple::new("knows", "a", "b")],
                negatives: vec![Triple::new("knows", "b", "a")],
            },
            ..Splits::default()
        };
        let mut out = Vec::new();
        Gexf::write(&splits, &mut out).unwrap();

        let mut reader = quick_xml::Reader::from_reader(out.as_slice());
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut edges = 0;
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) => {
                    depth += 1;
                    if e.name().as_ref() == b"edge" {
                        edges += 1;
                    }
                }
                Event::End(_) => depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        assert_eq!(depth, 0);
        assert_eq!(edges, 2);
    }
}
