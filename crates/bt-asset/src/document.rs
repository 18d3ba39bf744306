//! Document model and its XML form.

use bt_runtime::{TreeParams, MAX_TREE_DEPTH};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;

use crate::error::{xml_error, AssetError, Result};

const TREE: &str = "BehaviorTree";
const TRUNK: &str = "Trunk";
const APART: &str = "ApartBranches";
const TASK: &str = "Task";

/// Element nesting allowed by the reader: the deepest task chain a tree
/// accepts under `<BehaviorTree>` and its section element.
pub const MAX_DOCUMENT_DEPTH: usize = MAX_TREE_DEPTH + 2;

const BT_PARAMS: &str = "BTParams";
const CLASS_NAME: &str = "ClassName";
const NODE_DATA: &str = "NodeData";
const TASK_PARAMS: &str = "TaskParams";

/// A whole tree as persisted: parameters, the entry subtree and any loose
/// roots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDocument {
    pub params: TreeParams,
    pub trunk: TaskDocument,
    pub apart_branches: Vec<TaskDocument>,
}

/// One persisted task. `task_params` is `None` for nodes without a params
/// type.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDocument {
    pub class_name: String,
    pub node_data: Value,
    pub task_params: Option<Value>,
    pub children: Vec<TaskDocument>,
}

impl Default for TaskDocument {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            node_data: Value::Object(Default::default()),
            task_params: None,
            children: Vec::new(),
        }
    }
}

impl TaskDocument {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    /// Number of tasks in this subtree, itself included.
    pub fn task_count(&self) -> usize {
        1 + self.children.iter().map(TaskDocument::task_count).sum::<usize>()
    }
}

impl TreeDocument {
    pub fn task_count(&self) -> usize {
        self.trunk.task_count()
            + self
                .apart_branches
                .iter()
                .map(TaskDocument::task_count)
                .sum::<usize>()
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let params = serde_json::to_string(&self.params).map_err(AssetError::TreeParams)?;
        let mut root = BytesStart::new(TREE);
        root.push_attribute((BT_PARAMS, params.as_str()));
        writer.write_event(Event::Start(root)).map_err(xml_error)?;

        writer
            .write_event(Event::Start(BytesStart::new(TRUNK)))
            .map_err(xml_error)?;
        write_task(&mut writer, &self.trunk)?;
        writer
            .write_event(Event::End(BytesEnd::new(TRUNK)))
            .map_err(xml_error)?;

        if self.apart_branches.is_empty() {
            writer
                .write_event(Event::Empty(BytesStart::new(APART)))
                .map_err(xml_error)?;
        } else {
            writer
                .write_event(Event::Start(BytesStart::new(APART)))
                .map_err(xml_error)?;
            for branch in &self.apart_branches {
                write_task(&mut writer, branch)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(APART)))
                .map_err(xml_error)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new(TREE)))
            .map_err(xml_error)?;
        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let root = parse_elements(xml)?;
        if root.name != TREE {
            return Err(AssetError::UnexpectedElement {
                expected: TREE,
                found: root.name,
            });
        }

        // Older documents may omit the attribute; defaults apply.
        let params = match root.attr(BT_PARAMS) {
            Some(raw) => serde_json::from_str(raw).map_err(AssetError::TreeParams)?,
            None => TreeParams::default(),
        };

        let mut trunk = None;
        let mut apart_branches = Vec::new();
        for section in root.children {
            match section.name.as_str() {
                TRUNK if trunk.is_some() => {
                    return Err(AssetError::DuplicateElement(TRUNK));
                }
                TRUNK => {
                    let mut tasks = read_tasks(section)?;
                    if tasks.len() != 1 {
                        return Err(AssetError::TrunkShape(tasks.len()));
                    }
                    trunk = tasks.pop();
                }
                APART => apart_branches.extend(read_tasks(section)?),
                _ => {
                    return Err(AssetError::UnexpectedElement {
                        expected: TRUNK,
                        found: section.name,
                    })
                }
            }
        }

        Ok(Self {
            params,
            trunk: trunk.ok_or(AssetError::MissingElement(TRUNK))?,
            apart_branches,
        })
    }
}

fn write_task(writer: &mut Writer<Vec<u8>>, task: &TaskDocument) -> Result<()> {
    let node_data = serde_json::to_string(&task.node_data).map_err(|source| AssetError::Json {
        class: task.class_name.clone(),
        field: NODE_DATA,
        source,
    })?;
    let mut start = BytesStart::new(TASK);
    start.push_attribute((CLASS_NAME, task.class_name.as_str()));
    start.push_attribute((NODE_DATA, node_data.as_str()));
    if let Some(params) = &task.task_params {
        let params = serde_json::to_string(params).map_err(|source| AssetError::Json {
            class: task.class_name.clone(),
            field: TASK_PARAMS,
            source,
        })?;
        start.push_attribute((TASK_PARAMS, params.as_str()));
    }

    if task.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &task.children {
        write_task(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(TASK)))
        .map_err(xml_error)?;
    Ok(())
}

/// Generic element tree; the document layer is interpreted on top of it.
#[derive(Debug)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_elements(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        let event = reader.read_event().map_err(xml_error)?;
        let opens = matches!(event, Event::Start(_) | Event::Empty(_));
        if opens && stack.len() >= MAX_DOCUMENT_DEPTH {
            return Err(AssetError::NestingDepth(MAX_TREE_DEPTH));
        }
        let finished = match event {
            Event::Start(start) => {
                stack.push(Element::open(&start)?);
                None
            }
            Event::Empty(start) => Some(Element::open(&start)?),
            Event::End(_) => stack.pop(),
            Event::Eof => break,
            _ => None,
        };
        if let Some(element) = finished {
            match stack.last_mut() {
                Some(parent) => parent.children.push(element),
                None if root.is_none() => root = Some(element),
                None => return Err(AssetError::Xml("multiple root elements".into())),
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(AssetError::Xml(format!("unclosed <{}>", open.name)));
    }
    root.ok_or(AssetError::MissingElement(TREE))
}

fn read_tasks(section: Element) -> Result<Vec<TaskDocument>> {
    section.children.into_iter().map(read_task).collect()
}

fn read_task(element: Element) -> Result<TaskDocument> {
    if element.name != TASK {
        return Err(AssetError::UnexpectedElement {
            expected: TASK,
            found: element.name,
        });
    }
    let class_name = element
        .attr(CLASS_NAME)
        .filter(|name| !name.is_empty())
        .ok_or(AssetError::MissingAttribute {
            element: TASK,
            attribute: CLASS_NAME,
        })?
        .to_string();

    let parse = |field: &'static str| -> Result<Option<Value>> {
        element
            .attr(field)
            .map(serde_json::from_str)
            .transpose()
            .map_err(|source| AssetError::Json {
                class: class_name.clone(),
                field,
                source,
            })
    };
    let node_data = parse(NODE_DATA)?.unwrap_or_else(|| Value::Object(Default::default()));
    let task_params = parse(TASK_PARAMS)?;

    let children = read_tasks(element)?;
    Ok(TaskDocument {
        class_name,
        node_data,
        task_params,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TreeDocument {
        let mut seq = TaskDocument::new("Composite.Sequence");
        seq.node_data = json!({"position": {"x": 10.0, "y": 0.0}});
        seq.children.push(TaskDocument {
            task_params: Some(json!({"message": "say \"hi\" <now> & then"})),
            ..TaskDocument::new("Action.Log")
        });
        let mut entry = TaskDocument::new("Entry");
        entry.children.push(seq);

        TreeDocument {
            params: TreeParams {
                restart_on_turn_completed: true,
                share_variable_names: vec!["hp".into()],
            },
            trunk: entry,
            apart_branches: vec![TaskDocument::new("Action.Wait")],
        }
    }

    #[test]
    fn xml_round_trip_preserves_document() {
        let doc = sample();
        let xml = doc.to_xml().unwrap();
        assert!(xml.starts_with("<BehaviorTree BTParams="));
        assert_eq!(TreeDocument::from_xml(&xml).unwrap(), doc);
        assert_eq!(doc.task_count(), 4);
    }

    #[test]
    fn params_attribute_uses_camel_case() {
        let xml = sample().to_xml().unwrap();
        assert!(xml.contains("restartOnTurnCompleted"));
        assert!(xml.contains("shareVariableNames"));
    }

    #[test]
    fn tasks_without_params_omit_the_attribute() {
        let xml = sample().to_xml().unwrap();
        let wait_line = xml.lines().find(|line| line.contains("Action.Wait")).unwrap();
        assert!(!wait_line.contains("TaskParams"));
    }

    #[test]
    fn apart_branches_are_optional_on_read() {
        let xml = r#"<BehaviorTree BTParams="{}"><Trunk><Task ClassName="Entry" NodeData="{}"/></Trunk></BehaviorTree>"#;
        let doc = TreeDocument::from_xml(xml).unwrap();
        assert!(doc.apart_branches.is_empty());
        assert_eq!(doc.params, TreeParams::default());
    }

    #[test]
    fn non_task_element_is_rejected() {
        let xml = r#"<BehaviorTree><Trunk><Task ClassName="Entry"><Node/></Task></Trunk></BehaviorTree>"#;
        assert!(matches!(
            TreeDocument::from_xml(xml),
            Err(AssetError::UnexpectedElement { expected: "Task", .. })
        ));
    }

    #[test]
    fn trunk_needs_exactly_one_task() {
        let empty = r#"<BehaviorTree><Trunk/></BehaviorTree>"#;
        assert!(matches!(TreeDocument::from_xml(empty), Err(AssetError::TrunkShape(0))));

        let missing = r#"<BehaviorTree><ApartBranches/></BehaviorTree>"#;
        assert!(matches!(
            TreeDocument::from_xml(missing),
            Err(AssetError::MissingElement("Trunk"))
        ));

        let twice = r#"<BehaviorTree><Trunk><Task ClassName="Entry"/></Trunk><Trunk><Task ClassName="Entry"/></Trunk></BehaviorTree>"#;
        assert!(matches!(
            TreeDocument::from_xml(twice),
            Err(AssetError::DuplicateElement("Trunk"))
        ));
    }

    fn nested_tasks(levels: usize) -> String {
        let mut xml = String::from(r#"<BehaviorTree><Trunk>"#);
        for _ in 0..levels {
            xml.push_str(r#"<Task ClassName="Decorator.Succeeder">"#);
        }
        for _ in 0..levels {
            xml.push_str("</Task>");
        }
        xml.push_str("</Trunk></BehaviorTree>");
        xml
    }

    #[test]
    fn nesting_is_bounded() {
        let doc = TreeDocument::from_xml(&nested_tasks(MAX_TREE_DEPTH)).unwrap();
        assert_eq!(doc.task_count(), MAX_TREE_DEPTH);

        assert!(matches!(
            TreeDocument::from_xml(&nested_tasks(MAX_TREE_DEPTH + 1)),
            Err(AssetError::NestingDepth(MAX_TREE_DEPTH))
        ));
        assert!(matches!(
            TreeDocument::from_xml(&nested_tasks(20_000)),
            Err(AssetError::NestingDepth(_))
        ));
    }

    #[test]
    fn malformed_json_names_the_field() {
        let xml = r#"<BehaviorTree><Trunk><Task ClassName="Entry" NodeData="{oops"/></Trunk></BehaviorTree>"#;
        match TreeDocument::from_xml(xml) {
            Err(AssetError::Json { class, field, .. }) => {
                assert_eq!(class, "Entry");
                assert_eq!(field, "NodeData");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn broken_markup_is_an_error() {
        assert!(matches!(
            TreeDocument::from_xml("<BehaviorTree><Trunk>"),
            Err(AssetError::Xml(_))
        ));
    }
}
