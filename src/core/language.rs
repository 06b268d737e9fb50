//! Build language elements.
//!
//! Which element a markup node is depends only on its name and on what its
//! parent resolved to, so resolution is a lookup table rather than a type
//! hierarchy. [`walk`] resolves a whole tree and reports what it found as
//! a flat list of [`VisitEvent`]s.

use std::fmt;

use msbuild_expr::SourceSpan;

use super::markup::{Attribute, Element, MarkupDocument, NodeId};

/// What an element's content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Child elements only; children are resolved and visited.
    Nothing,
    /// A text value (property and metadata values).
    Value,
    /// Opaque content that is not visited.
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageElement {
    Project,
    PropertyGroup,
    Property,
    ItemGroup,
    Item,
    ItemDefinitionGroup,
    ItemDefinition,
    Metadata,
    Import,
    ImportGroup,
    Target,
    Task,
    Output,
    OnError,
    Choose,
    When,
    Otherwise,
    UsingTask,
    ParameterGroup,
    Parameter,
    UsingTaskBody,
    ProjectExtensions,
    Sdk,
}

const CONDITION: &[&str] = &["Condition", "Label"];

impl LanguageElement {
    /// Resolve an element by name under `parent` (`None` at the root).
    pub fn resolve(name: &str, parent: Option<LanguageElement>) -> Option<LanguageElement> {
        use LanguageElement::*;

        let Some(parent) = parent else {
            return name.eq_ignore_ascii_case("Project").then_some(Project);
        };
        let named = |candidates: &[(&str, LanguageElement)]| {
            candidates
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|&(_, element)| element)
        };

        match parent {
            Project => named(&[
                ("PropertyGroup", PropertyGroup),
                ("ItemGroup", ItemGroup),
                ("ItemDefinitionGroup", ItemDefinitionGroup),
                ("Import", Import),
                ("ImportGroup", ImportGroup),
                ("Target", Target),
                ("Choose", Choose),
                ("UsingTask", UsingTask),
                ("ProjectExtensions", ProjectExtensions),
                ("Sdk", Sdk),
            ]),
            PropertyGroup => Some(Property),
            ItemGroup => Some(Item),
            ItemDefinitionGroup => Some(ItemDefinition),
            Item | ItemDefinition => Some(Metadata),
            ImportGroup => named(&[("Import", Import)]),
            Target => named(&[
                ("PropertyGroup", PropertyGroup),
                ("ItemGroup", ItemGroup),
                ("OnError", OnError),
            ])
            .or(Some(Task)),
            Task => named(&[("Output", Output)]),
            Choose => named(&[("When", When), ("Otherwise", Otherwise)]),
            When | Otherwise => named(&[
                ("Choose", Choose),
                ("PropertyGroup", PropertyGroup),
                ("ItemGroup", ItemGroup),
            ]),
            UsingTask => named(&[("ParameterGroup", ParameterGroup), ("Task", UsingTaskBody)]),
            ParameterGroup => Some(Parameter),
            Property | Metadata | Import | Output | OnError | Parameter | UsingTaskBody
            | ProjectExtensions | Sdk => None,
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            LanguageElement::Property | LanguageElement::Metadata => ValueKind::Value,
            LanguageElement::UsingTaskBody | LanguageElement::ProjectExtensions => ValueKind::Data,
            _ => ValueKind::Nothing,
        }
    }

    /// Attributes this element understands.
    pub fn attributes(self) -> &'static [&'static str] {
        use LanguageElement::*;
        match self {
            Project => &[
                "ToolsVersion",
                "DefaultTargets",
                "InitialTargets",
                "Sdk",
                "TreatAsLocalProperty",
                "xmlns",
            ],
            Import => &["Project", "Condition", "Label", "Sdk", "Version", "MinimumVersion"],
            Item => &[
                "Include",
                "Exclude",
                "Remove",
                "Update",
                "Condition",
                "Label",
                "KeepMetadata",
                "RemoveMetadata",
                "KeepDuplicates",
            ],
            Target => &[
                "Name",
                "DependsOnTargets",
                "Inputs",
                "Outputs",
                "Returns",
                "BeforeTargets",
                "AfterTargets",
                "KeepDuplicateOutputs",
                "Condition",
                "Label",
            ],
            Task => &["Condition", "ContinueOnError"],
            Output => &["TaskParameter", "PropertyName", "ItemName", "Condition"],
            OnError => &["ExecuteTargets", "Condition"],
            UsingTask => &[
                "TaskName",
                "AssemblyFile",
                "AssemblyName",
                "TaskFactory",
                "Runtime",
                "Architecture",
                "Condition",
            ],
            Parameter => &["ParameterType", "Required", "Output"],
            UsingTaskBody => &["Evaluate"],
            Sdk => &["Name", "Version", "MinimumVersion"],
            Choose | ProjectExtensions => &[],
            PropertyGroup | Property | ItemGroup | ItemDefinitionGroup | ItemDefinition
            | Metadata | ImportGroup | When | Otherwise | ParameterGroup => CONDITION,
        }
    }

    /// Canonical spelling of an attribute this element understands.
    ///
    /// Task attributes are task parameters and are never unknown.
    pub fn attribute(self, name: &str) -> Option<&'static str> {
        let known = self
            .attributes()
            .iter()
            .copied()
            .find(|a| a.eq_ignore_ascii_case(name));
        match (known, self) {
            (Some(found), _) => Some(found),
            (None, LanguageElement::Task) => Some("Parameter"),
            (None, _) => None,
        }
    }

    pub fn name(self) -> &'static str {
        use LanguageElement::*;
        match self {
            Project => "Project",
            PropertyGroup => "PropertyGroup",
            Property => "Property",
            ItemGroup => "ItemGroup",
            Item => "Item",
            ItemDefinitionGroup => "ItemDefinitionGroup",
            ItemDefinition => "ItemDefinition",
            Metadata => "Metadata",
            Import => "Import",
            ImportGroup => "ImportGroup",
            Target => "Target",
            Task => "Task",
            Output => "Output",
            OnError => "OnError",
            Choose => "Choose",
            When => "When",
            Otherwise => "Otherwise",
            UsingTask => "UsingTask",
            ParameterGroup => "ParameterGroup",
            Parameter => "Parameter",
            UsingTaskBody => "UsingTaskBody",
            ProjectExtensions => "ProjectExtensions",
            Sdk => "Sdk",
        }
    }
}

impl fmt::Display for LanguageElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Something found while walking a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitEvent<'a> {
    ResolvedElement {
        id: NodeId,
        resolved: LanguageElement,
    },
    UnknownElement {
        id: NodeId,
    },
    ResolvedAttribute {
        id: NodeId,
        resolved: LanguageElement,
        name: &'static str,
        attribute: &'a Attribute,
    },
    UnknownAttribute {
        id: NodeId,
        attribute: &'a Attribute,
    },
    ElementValue {
        id: NodeId,
        resolved: LanguageElement,
        value: &'a str,
        span: SourceSpan,
    },
}

/// Resolve every element of `document` and report what was found, in
/// document order. With a `range`, only nodes overlapping it are visited.
pub fn walk(document: &MarkupDocument, range: Option<SourceSpan>) -> Vec<VisitEvent<'_>> {
    let mut events = Vec::new();
    let Some(root) = document.root() else {
        return events;
    };

    let mut stack: Vec<(NodeId, Option<LanguageElement>)> = vec![(root, None)];
    while let Some((id, parent)) = stack.pop() {
        let Some(element) = document.get(id) else {
            continue;
        };
        let Some(resolved) = LanguageElement::resolve(&element.name, parent) else {
            events.push(VisitEvent::UnknownElement { id });
            continue;
        };
        events.push(VisitEvent::ResolvedElement { id, resolved });
        visit_attributes_and_value(id, element, resolved, range, &mut events);

        if resolved.value_kind() == ValueKind::Nothing {
            let children: Vec<NodeId> = element
                .children
                .iter()
                .copied()
                .filter_map(|child| document.get(child).map(|e| (child, e)))
                .skip_while(|(_, e)| range.is_some_and(|r| e.span.end < r.start))
                .take_while(|(_, e)| range.map_or(true, |r| e.start_tag.start <= r.end))
                .map(|(child, _)| child)
                .collect();
            stack.extend(children.into_iter().rev().map(|child| (child, Some(resolved))));
        }
    }
    events
}

fn visit_attributes_and_value<'a>(
    id: NodeId,
    element: &'a Element,
    resolved: LanguageElement,
    range: Option<SourceSpan>,
    events: &mut Vec<VisitEvent<'a>>,
) {
    for attribute in &element.attributes {
        if let Some(r) = range {
            if attribute.value_span.end < r.start {
                continue;
            }
            if attribute.name_span.start > r.end {
                break;
            }
        }
        match resolved.attribute(&attribute.name) {
            Some(name) => events.push(VisitEvent::ResolvedAttribute {
                id,
                resolved,
                name,
                attribute,
            }),
            None => events.push(VisitEvent::UnknownAttribute { id, attribute }),
        }
    }

    if resolved.value_kind() == ValueKind::Value && !element.self_closing {
        if let Some(span) = element.value_span {
            events.push(VisitEvent::ElementValue {
                id,
                resolved,
                value: &element.text,
                span,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_side_table() {
        use LanguageElement::*;
        assert_eq!(LanguageElement::resolve("Project", None), Some(Project));
        assert_eq!(LanguageElement::resolve("PropertyGroup", None), None);
        assert_eq!(LanguageElement::resolve("import", Some(Project)), Some(Import));
        assert_eq!(LanguageElement::resolve("OutputPath", Some(PropertyGroup)), Some(Property));
        assert_eq!(LanguageElement::resolve("Csc", Some(Target)), Some(Task));
        assert_eq!(LanguageElement::resolve("Output", Some(Task)), Some(Output));
        assert_eq!(LanguageElement::resolve("Import", Some(ImportGroup)), Some(Import));
        assert_eq!(LanguageElement::resolve("Bogus", Some(Project)), None);
        assert_eq!(LanguageElement::resolve("Anything", Some(Property)), None);
    }

    #[test]
    fn test_attributes() {
        assert_eq!(LanguageElement::Import.attribute("project"), Some("Project"));
        assert_eq!(LanguageElement::Import.attribute("Include"), None);
        assert_eq!(LanguageElement::Task.attribute("Sources"), Some("Parameter"));
        assert_eq!(LanguageElement::Property.value_kind(), ValueKind::Value);
    }

    #[test]
    fn test_walk_events() {
        let doc = MarkupDocument::parse(
            r#"<Project Foo="x">
  <PropertyGroup>
    <A>1</A>
    <B />
  </PropertyGroup>
  <Bogus><Import Project="never" /></Bogus>
  <Import Project="a.props" />
</Project>"#,
        )
        .unwrap();

        let summary: Vec<String> = walk(&doc, None)
            .iter()
            .map(|event| match event {
                VisitEvent::ResolvedElement { resolved, .. } => format!("element {}", resolved),
                VisitEvent::UnknownElement { id } => {
                    format!("unknown {}", doc.get(*id).map(|e| e.name.as_str()).unwrap_or(""))
                }
                VisitEvent::ResolvedAttribute { name, attribute, .. } => {
                    format!("attribute {}={}", name, attribute.value)
                }
                VisitEvent::UnknownAttribute { attribute, .. } => {
                    format!("unknown attribute {}", attribute.name)
                }
                VisitEvent::ElementValue { value, .. } => format!("value {}", value),
            })
            .collect();

        assert_eq!(
            summary,
            [
                "element Project",
                "unknown attribute Foo",
                "element PropertyGroup",
                "element Property",
                "value 1",
                "element Property",
                "unknown Bogus",
                "element Import",
                "attribute Project=a.props",
            ]
        );
    }

    #[test]
    fn test_walk_range() {
        let text = "<Project><Import Project=\"a\" /><Import Project=\"b\" /></Project>";
        let doc = MarkupDocument::parse(text).unwrap();
        let second = text.rfind("<Import").unwrap();
        let imports = walk(&doc, Some(SourceSpan::new(second, text.len())))
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    VisitEvent::ResolvedElement {
                        resolved: LanguageElement::Import,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(imports, 1);
    }
}
