//! Prompt text for the agent roles.

use std::collections::BTreeMap;

pub const ANALYST_SYSTEM: &str = "The Format Analyst agent extracts type definitions, structural \
hierarchies and constraints of an input format through specification-based and input-based \
analysis, storing the results in a database for subsequent agents to use.";

pub const PLANNER_SYSTEM: &str =
    "You are a Sequence Planner that proposes new type-level sequences to increase coverage.";

pub const DESIGNER_SYSTEM: &str = "You are the Field Designer. Your task is to generate new fields \
and confirm the constraints and features of a given message type.";

pub const DEVELOPER_SYSTEM: &str =
    "You are a Developer whose role is to generate new seeds based on a given sequence.";

/// Reply marker a field designer uses when a type is exhausted.
pub const EXIT_MARKER: &str = "<<EXIT>>";

fn reference(spec: Option<&str>) -> String {
    match spec {
        Some(text) if !text.trim().is_empty() => format!(
            "\nReference material supplied by the user (prefer it over memory when they disagree):\n```text\n{}\n```\n",
            text.trim()
        ),
        _ => String::new(),
    }
}

pub fn type_discovery(target: &str, spec: Option<&str>) -> String {
    format!(
        r#"You are a domain expert with deep understanding of {target}.
[TARGET_TYPE] is one of: protocol, file_library, application.
{reference}
1) What to extract
- If {target} is a protocol: every client-to-server message type defined for {target}, including
  extended or optional messages from official specifications. Exclude server-to-client messages.
- Otherwise: every input file format {target} accepts.

2) Output format
Return a single JSON object in a ```json block:
```json
{{
  "target": "{target}",
  "target_type": "protocol",
  "types": [
    {{"name": "TYPE_A"}},
    {{"name": "TYPE_B"}}
  ]
}}
```

3) Sources
Base the list on official documents, RFCs or recognised standards only. List them with titles and URLs.
Mark anything unofficial or conditional under "Potential Candidates" outside the JSON block."#,
        reference = reference(spec),
    )
}

pub fn format_spec(target: &str, type_name: &str, spec: Option<&str>) -> String {
    format!(
        r#"You are a domain expert with deep understanding of {target}.
{reference}
1) What to extract
Documentation-backed details for the {type_name} of {target}: what the structure contains and how it
is used (exclude byte order and framing).
- Overview: purpose and role of {type_name}; when and why it appears.
- Fields: name, description, required, multiplicity, order, location, constraints (constants, enums,
  ranges, length rules, patterns, cross-field predicates), dependencies, defaults.
- Magic numbers and type codes with their exact values and meaning.
- Functional semantics, relations to other types (must_precede, allowed_child, ...), error rules.

2) Output format
Return a single JSON object in a ```json block:
```json
{{
  "target": "{target}",
  "type_name": "{type_name}",
  "artifact_kind": "message|record|chunk|section",
  "description": "<purpose>",
  "fields": [{{"name": "<field>", "description": "<meaning>", "required": true, "constraints": {{}}, "dependencies": []}}],
  "magic": [{{"value": "<literal>", "meaning": "<semantics>"}}],
  "relations": [{{"type": "must_precede", "with": "<other type>"}}],
  "functional_semantics": "<behaviour>",
  "errors": ["<validation rule>"],
  "provenance": [{{"source": "<RFC or manual>", "uri": "<URL>"}}]
}}
```"#,
        reference = reference(spec),
    )
}

pub fn seed_analysis(target: &str, seed_dir: &str) -> String {
    format!(
        r#"You are a domain expert with deep understanding of {target}.

Analyze the seed inputs of {target} stored in:
```text
{seed_dir}
```
Use the file tools to list and read them (hex or ASCII as appropriate). You may write parsing code
with run_code to split a seed into units.

1) What to extract
- The type(s) each seed corresponds to.
- Every field present: name, description, exact value, constraints, dependencies and whether it is
  mandatory or optional.
- Magic numbers, type codes and identifiers.
- For multi-unit seeds: ordering, cross-unit dependencies and state transitions.
- Functional semantics and any anomaly against the documented rules.

2) Output format
A single JSON object in a ```json block, organised into logical keys ("type", "fields", "sequence",
"relations", "magic", "semantics", ...). Always include exact field values."#
    )
}

pub fn sequence_extraction(target: &str, file: &str, types: &[String]) -> String {
    format!(
        r#"You are a domain expert with deep understanding of {target}.

Analyze the seed input below and extract ONLY its sequence order, using the allowed types.
Do not extract field details.

1) Input file
```text
{file}
```

2) Allowed types
```text
{types:?}
```

3) Output format
A JSON object with integer keys starting at 1 and type values:
```json
{{
  "1": "TYPE_A",
  "2": "TYPE_B"
}}
```"#
    )
}

pub fn sequence_plan(target: &str, types: &[String], known: &[String]) -> String {
    let known = if known.is_empty() {
        "(none yet)".to_string()
    } else {
        known.join("\n")
    };
    format!(
        r#"You are a domain expert with deep understanding of {target}.

Propose one new type-level sequence that is likely to increase coverage of {target}.

1) Allowed types
```text
{types:?}
```

2) Known sequences (also searchable with query_memory on sequence_db)
```text
{known}
```
Use coverage_lookup to check recorded coverage for candidate sequences when data is available.

3) Procedure
- Propose a candidate, look up similar sequences and their coverage, then mutate it (reorder, insert,
  delete, replace) until it clearly improves on its nearest neighbours, or after 5 iterations return
  the best candidate.
- Use only the allowed types. Keep it short unless coverage evidence justifies a longer one.

4) Output format
Only the final sequence, as a JSON object with integer keys starting at 1:
```json
{{
  "1": "TYPE_A",
  "2": "TYPE_B",
  "3": "TYPE_C"
}}
```"#
    )
}

pub fn field_design(target: &str, type_name: &str, seed_dir: &str, previous: &[String]) -> String {
    let previous = if previous.is_empty() {
        "(none)".to_string()
    } else {
        previous.join("\n")
    };
    format!(
        r#"You are a domain expert with deep understanding of {target}.

Consult format_spec_db (query_memory) and confirm the constraints and structure of the given type,
then design new fields and message characteristics that strictly satisfy the specification, are
diverse enough to reach deeper code paths and do not duplicate existing designs.

1) Inputs
- Given type: {type_name}
- seed_dir: {seed_dir}
- Designs already recorded for this type:
```text
{previous}
```

2) Output format
```json
{{
  "type": "{type_name}",
  "design": "Feature:\n1. ...\n2. ...\nConstraints:\n1. ...\n2. ..."
}}
```

3) Exit criteria
If no further feature or constraint would increase coverage for {type_name}, ignore the output format
and reply with exactly:
```text
{EXIT_MARKER}
```"#
    )
}

pub fn develop(
    target: &str,
    seed_dir: &str,
    output_dir: &str,
    sequence: &BTreeMap<u32, String>,
    instructions: &str,
) -> String {
    let steps: Vec<&str> = sequence.values().map(String::as_str).collect();
    format!(
        r#"Generate one new seed that {target} can accept.

1) Inputs
- target: {target}
- seed_dir (existing seeds, consult when unsure of the format): {seed_dir}
- sequence: {steps:?}
- message instructions:
{instructions}
- format_spec_db: constraints and byte-level structures (query_memory)
- component_db: additional field features (query_memory)

2) Rules
- Implement the generator in Python, C, C++ or Java with run_code, or build the bytes with run_command.
- Respect the sequence order and include every type it names.
- Binary protocols must be written as real binary data, not as escaped strings.
- Save the seed under {output_dir} with a file name that does not exist yet.

3) Output format
```json
{{
  "status": "Success",
  "seed_name": "your_generated_seed_name.raw"
}}
```
or, if generation was not possible:
```json
{{
  "status": "Failed"
}}
```"#
    )
}
