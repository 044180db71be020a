// Copyright (c) The nio-inspector Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::parser::{CompilationUnit, Declaration, DeclarationKind};
use indexmap::IndexMap;

/// Maps the fully-qualified name of every type declared in `unit`, nested types included, to its
/// source text.
pub fn extract_classes_with_code(
    source: &str,
    unit: &CompilationUnit,
) -> IndexMap<String, String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut classes = IndexMap::new();
    for declaration in &unit.types {
        visit_types(&package_prefix(unit), declaration, &mut |name, declaration| {
            classes.insert(name.to_owned(), excerpt(&lines, declaration).trim().to_owned());
        });
    }
    classes
}

/// Maps `<type>.<method>` to the source text of public methods and constructors.
///
/// Interface methods count as public unless they are private. Overloads share a key, with
/// their texts joined by a newline. Constructors are keyed `<type>.<Type>`.
pub fn extract_methods_with_code(
    source: &str,
    unit: &CompilationUnit,
) -> IndexMap<String, String> {
    let lines: Vec<&str> = source.lines().collect();
    let mut methods: IndexMap<String, String> = IndexMap::new();
    for declaration in &unit.types {
        visit_types(&package_prefix(unit), declaration, &mut |type_name, declaration| {
            let in_interface = matches!(
                declaration.kind,
                DeclarationKind::Interface | DeclarationKind::Annotation
            );
            for member in &declaration.members {
                if member.kind.is_type() {
                    continue;
                }
                let visible = member.has_modifier("public")
                    || (in_interface && !member.has_modifier("private"));
                if !visible {
                    continue;
                }
                let code = excerpt(&lines, member);
                methods
                    .entry(format!("{type_name}.{}", member.name))
                    .and_modify(|existing| {
                        existing.push('\n');
                        existing.push_str(&code);
                    })
                    .or_insert(code);
            }
        });
    }
    methods
}

fn package_prefix(unit: &CompilationUnit) -> String {
    unit.package
        .as_ref()
        .map_or_else(String::new, |package| format!("{package}."))
}

fn visit_types(
    prefix: &str,
    declaration: &Declaration,
    f: &mut dyn FnMut(&str, &Declaration),
) {
    let name = format!("{prefix}{}", declaration.name);
    f(&name, declaration);
    let nested_prefix = format!("{name}.");
    for member in declaration.members.iter().filter(|member| member.kind.is_type()) {
        visit_types(&nested_prefix, member, f);
    }
}

fn excerpt(lines: &[&str], declaration: &Declaration) -> String {
    let start = declaration.start_line.saturating_sub(1);
    let end = declaration.end_line.min(lines.len());
    lines.get(start..end).unwrap_or_default().join("\n")
}
