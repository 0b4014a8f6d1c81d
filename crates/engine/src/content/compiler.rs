use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::app::{Pose, Vec3};
use crate::AppPaths;

use super::database::{
    ActorArchetype, ActorDefId, DefDatabase, LevelDef, LevelDefId, StartZoneDef, ZoneBox,
};
use super::discovery::discover_mod_sources;
use super::types::{ContentDiscoveryError, ContentRequest};

const DEFAULT_MOVE_SPEED: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    Discovery,
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} [{} {}",
            self.code,
            self.message,
            self.mod_id,
            self.file_path.display()
        )?;
        if let Some(SourceLocation { line, column }) = self.location {
            write!(f, ":{line}:{column}")?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone)]
struct DefOrigin {
    mod_id: String,
    file_path: PathBuf,
    location: SourceLocation,
}

impl DefOrigin {
    fn error(&self, code: ContentErrorCode, message: String) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.clone(),
            file_path: self.file_path.clone(),
            location: Some(self.location),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingActorDef {
    origin: DefOrigin,
    def_name: String,
    label: String,
    move_speed: f32,
    has_recorder: bool,
}

#[derive(Debug, Clone)]
struct PendingLevelDef {
    origin: DefOrigin,
    def_name: String,
    label: String,
    player_def: String,
    clone_def: String,
    player_start: Vec3,
    start_zones: Vec<StartZoneDef>,
    end_zones: Vec<ZoneBox>,
}

#[derive(Debug, Default)]
struct ParsedDocument {
    actors: Vec<PendingActorDef>,
    levels: Vec<PendingLevelDef>,
}

/// Defs merged across mods. Later mods replace earlier defs of the same
/// name; within one mod a name may appear once per def type.
#[derive(Debug, Default)]
struct MergedDefs {
    actors: BTreeMap<String, PendingActorDef>,
    levels: BTreeMap<String, PendingLevelDef>,
}

#[derive(Debug, Default)]
struct ModScope {
    actor_names: HashSet<String>,
    level_names: HashSet<String>,
}

impl MergedDefs {
    fn merge_document(
        &mut self,
        scope: &mut ModScope,
        parsed: ParsedDocument,
    ) -> Result<(), ContentCompileError> {
        for def in parsed.actors {
            if !scope.actor_names.insert(def.def_name.clone()) {
                return Err(duplicate_in_mod("ActorDef", &def.def_name, &def.origin));
            }
            self.actors.insert(def.def_name.clone(), def);
        }
        for def in parsed.levels {
            if !scope.level_names.insert(def.def_name.clone()) {
                return Err(duplicate_in_mod("LevelDef", &def.def_name, &def.origin));
            }
            self.levels.insert(def.def_name.clone(), def);
        }
        Ok(())
    }

    fn into_database(self) -> Result<DefDatabase, ContentCompileError> {
        let actor_ids = self
            .actors
            .keys()
            .enumerate()
            .map(|(idx, name)| (name.clone(), ActorDefId(idx as u32)))
            .collect::<HashMap<_, _>>();

        let mut level_defs = Vec::with_capacity(self.levels.len());
        for def in self.levels.into_values() {
            let player_def = resolve_actor_ref(&actor_ids, &def, "playerDef", &def.player_def)?;
            let clone_def = resolve_actor_ref(&actor_ids, &def, "cloneDef", &def.clone_def)?;
            level_defs.push(LevelDef {
                id: LevelDefId(0),
                def_name: def.def_name,
                label: def.label,
                player_def,
                clone_def,
                player_start: def.player_start,
                start_zones: def.start_zones,
                end_zones: def.end_zones,
            });
        }

        let actor_defs = self
            .actors
            .into_values()
            .map(|def| ActorArchetype {
                id: ActorDefId(0),
                def_name: def.def_name,
                label: def.label,
                move_speed: def.move_speed,
                has_recorder: def.has_recorder,
            })
            .collect::<Vec<_>>();

        Ok(DefDatabase::from_defs(actor_defs, level_defs))
    }
}

fn resolve_actor_ref(
    actor_ids: &HashMap<String, ActorDefId>,
    level: &PendingLevelDef,
    field_name: &str,
    target: &str,
) -> Result<ActorDefId, ContentCompileError> {
    actor_ids.get(target).copied().ok_or_else(|| {
        level.origin.error(
            ContentErrorCode::UnknownReference,
            format!(
                "<{}> '{}' in LevelDef '{}' does not name a known ActorDef",
                field_name, target, level.def_name
            ),
        )
    })
}

fn duplicate_in_mod(def_type: &str, def_name: &str, origin: &DefOrigin) -> ContentCompileError {
    origin.error(
        ContentErrorCode::DuplicateDefInMod,
        format!(
            "duplicate {} '{}' in mod '{}'; each mod may define a defName only once",
            def_type, def_name, origin.mod_id
        ),
    )
}

pub fn compile_def_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<DefDatabase, ContentCompileError> {
    let sources = discover_mod_sources(app_paths, request)
        .map_err(|error| map_discovery_error(error, &app_paths.root))?;

    let mut merged = MergedDefs::default();
    for source in sources {
        let xml_files = collect_xml_files_sorted(&source.source_dir)
            .map_err(|error| read_error(&source.mod_id, error.path, error.source))?;
        let mut scope = ModScope::default();

        for xml_file in xml_files {
            let raw = fs::read_to_string(&xml_file)
                .map_err(|source_err| read_error(&source.mod_id, xml_file.clone(), source_err))?;
            let parsed = parse_defs_document(&source.mod_id, &xml_file, &raw)?;
            merged.merge_document(&mut scope, parsed)?;
        }
    }

    merged.into_database()
}

/// Compiles a single in-memory `<Defs>` document as if it were the only file
/// of mod `mod_id`.
pub fn compile_defs_from_str(mod_id: &str, raw: &str) -> Result<DefDatabase, ContentCompileError> {
    let file_path = PathBuf::from(format!("<{mod_id}>"));
    let parsed = parse_defs_document(mod_id, &file_path, raw)?;
    let mut merged = MergedDefs::default();
    merged.merge_document(&mut ModScope::default(), parsed)?;
    merged.into_database()
}

struct DocContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn origin(&self, node: Node<'_, '_>) -> DefOrigin {
        DefOrigin {
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: self.location(node),
        }
    }

    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        self.origin(node).error(code, message)
    }

    fn missing(&self, field_name: &str, def_type: &str, node: Node<'_, '_>) -> ContentCompileError {
        self.error(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <{def_type}>"),
            node,
        )
    }

    fn ensure_unique(
        &self,
        seen: &mut HashSet<String>,
        field: Node<'_, '_>,
        def_type: &str,
    ) -> Result<(), ContentCompileError> {
        let field_name = field.tag_name().name();
        if seen.insert(field_name.to_string()) {
            Ok(())
        } else {
            Err(self.error(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <{def_type}>"),
                field,
            ))
        }
    }

    fn unknown_field(&self, field: Node<'_, '_>, def_type: &str) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownField,
            format!("unknown field <{}> in <{def_type}>", field.tag_name().name()),
            field,
        )
    }

    fn required_text(&self, node: Node<'_, '_>) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{}> must not be empty", node.tag_name().name()),
                node,
            ));
        }
        Ok(value)
    }

    fn parse_f32(&self, node: Node<'_, '_>) -> Result<f32, ContentCompileError> {
        let value = self.required_text(node)?;
        match value.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{}' is not a valid finite number",
                    node.tag_name().name(),
                    value
                ),
                node,
            )),
        }
    }

    fn parse_u32(&self, node: Node<'_, '_>) -> Result<u32, ContentCompileError> {
        let value = self.required_text(node)?;
        value.parse::<u32>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{}' is not a valid non-negative integer",
                    node.tag_name().name(),
                    value
                ),
                node,
            )
        })
    }

    fn parse_bool(&self, node: Node<'_, '_>) -> Result<bool, ContentCompileError> {
        let value = self.required_text(node)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{}' is invalid; allowed values: true, false",
                    node.tag_name().name(),
                    value
                ),
                node,
            )),
        }
    }

    /// Accepts `x y z` with whitespace and/or comma separators.
    fn parse_vec3(&self, node: Node<'_, '_>) -> Result<Vec3, ContentCompileError> {
        let value = self.required_text(node)?;
        let parts = value
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>();
        match parts.as_deref() {
            Ok([x, y, z]) if x.is_finite() && y.is_finite() && z.is_finite() => {
                Ok(Vec3::new(*x, *y, *z))
            }
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "{} '{}' must be three finite numbers 'x y z'",
                    node.tag_name().name(),
                    value
                ),
                node,
            )),
        }
    }
}

fn parse_defs_document(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<ParsedDocument, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        mod_id: mod_id.to_string(),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = DocContext {
        mod_id,
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut parsed = ParsedDocument::default();
    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "ActorDef" => parsed.actors.push(parse_actor_def(&ctx, child)?),
            "LevelDef" => parsed.levels.push(parse_level_def(&ctx, child)?),
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!("unsupported def type <{other}>; expected <ActorDef> or <LevelDef>"),
                    child,
                ))
            }
        }
    }

    Ok(parsed)
}

fn parse_actor_def(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingActorDef, ContentCompileError> {
    const DEF_TYPE: &str = "ActorDef";
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut move_speed: Option<f32> = None;
    let mut has_recorder: Option<bool> = None;

    for field in node.children().filter(|child| child.is_element()) {
        ctx.ensure_unique(&mut seen_fields, field, DEF_TYPE)?;
        match field.tag_name().name() {
            "defName" => def_name = Some(ctx.required_text(field)?),
            "label" => label = Some(ctx.required_text(field)?),
            "moveSpeed" => {
                let parsed = ctx.parse_f32(field)?;
                if parsed < 0.0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "moveSpeed must be finite and >= 0".to_string(),
                        field,
                    ));
                }
                move_speed = Some(parsed);
            }
            "recorder" => has_recorder = Some(ctx.parse_bool(field)?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    let def_name = def_name.ok_or_else(|| ctx.missing("defName", DEF_TYPE, node))?;
    let label = label.ok_or_else(|| ctx.missing("label", DEF_TYPE, node))?;

    Ok(PendingActorDef {
        origin: ctx.origin(node),
        def_name,
        label,
        move_speed: move_speed.unwrap_or(DEFAULT_MOVE_SPEED),
        has_recorder: has_recorder.unwrap_or(true),
    })
}

fn parse_level_def(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<PendingLevelDef, ContentCompileError> {
    const DEF_TYPE: &str = "LevelDef";
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut player_def: Option<String> = None;
    let mut clone_def: Option<String> = None;
    let mut player_start: Option<Vec3> = None;
    let mut start_zones = Vec::new();
    let mut end_zones = Vec::new();

    for field in node.children().filter(|child| child.is_element()) {
        match field.tag_name().name() {
            "startZone" => {
                start_zones.push(parse_start_zone(ctx, field)?);
                continue;
            }
            "endZone" => {
                end_zones.push(parse_end_zone(ctx, field)?);
                continue;
            }
            _ => ctx.ensure_unique(&mut seen_fields, field, DEF_TYPE)?,
        }
        match field.tag_name().name() {
            "defName" => def_name = Some(ctx.required_text(field)?),
            "label" => label = Some(ctx.required_text(field)?),
            "playerDef" => player_def = Some(ctx.required_text(field)?),
            "cloneDef" => clone_def = Some(ctx.required_text(field)?),
            "playerStart" => player_start = Some(ctx.parse_vec3(field)?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    Ok(PendingLevelDef {
        origin: ctx.origin(node),
        def_name: def_name.ok_or_else(|| ctx.missing("defName", DEF_TYPE, node))?,
        label: label.ok_or_else(|| ctx.missing("label", DEF_TYPE, node))?,
        player_def: player_def.ok_or_else(|| ctx.missing("playerDef", DEF_TYPE, node))?,
        clone_def: clone_def.ok_or_else(|| ctx.missing("cloneDef", DEF_TYPE, node))?,
        player_start: player_start.ok_or_else(|| ctx.missing("playerStart", DEF_TYPE, node))?,
        start_zones,
        end_zones,
    })
}

fn parse_start_zone(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<StartZoneDef, ContentCompileError> {
    const DEF_TYPE: &str = "startZone";
    let mut seen_fields = HashSet::<String>::new();
    let mut center: Option<Vec3> = None;
    let mut half_extents: Option<Vec3> = None;
    let mut loop_duration: Option<f32> = None;
    let mut max_clones: Option<u32> = None;
    let mut spawn_position: Option<Vec3> = None;
    let mut spawn_yaw_degrees: Option<f32> = None;

    for field in node.children().filter(|child| child.is_element()) {
        ctx.ensure_unique(&mut seen_fields, field, DEF_TYPE)?;
        match field.tag_name().name() {
            "center" => center = Some(ctx.parse_vec3(field)?),
            "halfExtents" => half_extents = Some(parse_half_extents(ctx, field)?),
            "loopDuration" => {
                let parsed = ctx.parse_f32(field)?;
                if parsed <= 0.0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "loopDuration must be > 0 seconds".to_string(),
                        field,
                    ));
                }
                loop_duration = Some(parsed);
            }
            "maxClones" => max_clones = Some(ctx.parse_u32(field)?),
            "spawnPosition" => spawn_position = Some(ctx.parse_vec3(field)?),
            "spawnYawDegrees" => spawn_yaw_degrees = Some(ctx.parse_f32(field)?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    let center = center.ok_or_else(|| ctx.missing("center", DEF_TYPE, node))?;
    let half_extents = half_extents.ok_or_else(|| ctx.missing("halfExtents", DEF_TYPE, node))?;
    let loop_duration_seconds =
        loop_duration.ok_or_else(|| ctx.missing("loopDuration", DEF_TYPE, node))?;
    let max_clones = max_clones.ok_or_else(|| ctx.missing("maxClones", DEF_TYPE, node))?;

    Ok(StartZoneDef {
        bounds: ZoneBox {
            center,
            half_extents,
        },
        loop_duration_seconds,
        max_clones,
        spawn: Pose::with_yaw_degrees(
            spawn_position.unwrap_or(center),
            spawn_yaw_degrees.unwrap_or(0.0),
        ),
    })
}

fn parse_end_zone(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<ZoneBox, ContentCompileError> {
    const DEF_TYPE: &str = "endZone";
    let mut seen_fields = HashSet::<String>::new();
    let mut center: Option<Vec3> = None;
    let mut half_extents: Option<Vec3> = None;

    for field in node.children().filter(|child| child.is_element()) {
        ctx.ensure_unique(&mut seen_fields, field, DEF_TYPE)?;
        match field.tag_name().name() {
            "center" => center = Some(ctx.parse_vec3(field)?),
            "halfExtents" => half_extents = Some(parse_half_extents(ctx, field)?),
            _ => return Err(ctx.unknown_field(field, DEF_TYPE)),
        }
    }

    Ok(ZoneBox {
        center: center.ok_or_else(|| ctx.missing("center", DEF_TYPE, node))?,
        half_extents: half_extents.ok_or_else(|| ctx.missing("halfExtents", DEF_TYPE, node))?,
    })
}

fn parse_half_extents(
    ctx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Vec3, ContentCompileError> {
    let extents = ctx.parse_vec3(node)?;
    if extents.x < 0.0 || extents.y < 0.0 || extents.z < 0.0 {
        return Err(ctx.error(
            ContentErrorCode::InvalidValue,
            "halfExtents components must be >= 0".to_string(),
            node,
        ));
    }
    Ok(extents)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

/// Every `.xml` file below `root`, ordered by `/`-joined relative path so
/// merge order does not depend on the platform or directory listing order.
fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut keyed = Vec::<(String, PathBuf)>::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let listing = fs::read_dir(&dir).map_err(|source| ReadError {
            path: dir.clone(),
            source,
        })?;
        for entry in listing {
            let path = entry
                .map_err(|source| ReadError {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.is_dir() {
                dirs.push(path);
                continue;
            }
            let is_xml = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
            if is_xml {
                let key = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keyed.push((key, path));
            }
        }
    }
    keyed.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(keyed.into_iter().map(|(_, path)| path).collect())
}

fn read_error(mod_id: &str, path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

fn map_discovery_error(error: ContentDiscoveryError, root: &Path) -> ContentCompileError {
    match error {
        ContentDiscoveryError::EnabledModMissing {
            mod_id,
            expected_dir,
        } => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: format!(
                "enabled mod '{}' not found at {}; check {}",
                mod_id,
                expected_dir.display(),
                crate::ENABLED_MODS_ENV_VAR
            ),
            mod_id,
            file_path: expected_dir,
            location: None,
        },
        other => ContentCompileError {
            code: ContentErrorCode::Discovery,
            message: other.to_string(),
            mod_id: "<discovery>".to_string(),
            file_path: root.to_path_buf(),
            location: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const ACTORS: &str = r#"
        <ActorDef><defName>actor.player</defName><label>Player</label><moveSpeed>6.5</moveSpeed></ActorDef>
        <ActorDef><defName>actor.echo</defName><label>Echo</label></ActorDef>
    "#;

    fn setup_app_paths(root: &Path) -> AppPaths {
        let base = root.join("assets").join("base");
        let mods = root.join("mods");
        fs::create_dir_all(&base).expect("base");
        fs::create_dir_all(&mods).expect("mods");
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: base,
            mods_dir: mods,
        }
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn defs(body: &str) -> String {
        format!("<Defs>{body}</Defs>")
    }

    fn level(zones: &str) -> String {
        format!(
            r#"<LevelDef>
                <defName>level.test</defName>
                <label>Test</label>
                <playerDef>actor.player</playerDef>
                <cloneDef>actor.echo</cloneDef>
                <playerStart>0 0 -6</playerStart>
                {zones}
            </LevelDef>"#
        )
    }

    const START_ZONE: &str = r#"<startZone>
        <center>0 1 0</center>
        <halfExtents>2 1 2</halfExtents>
        <loopDuration>4</loopDuration>
        <maxClones>3</maxClones>
    </startZone>"#;

    #[test]
    fn valid_compile_assigns_stable_ids_by_def_name() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            &defs(
                r#"<ActorDef><defName>zeta</defName><label>Zeta</label></ActorDef>
                   <ActorDef><defName>alpha</defName><label>Alpha</label></ActorDef>"#,
            ),
        );
        let db = compile_def_database(&app, &ContentRequest::default()).expect("compile");
        let alpha = db.actor_def_id_by_name("alpha").expect("alpha");
        let zeta = db.actor_def_id_by_name("zeta").expect("zeta");
        assert!(alpha.0 < zeta.0);
    }

    #[test]
    fn actor_defaults_apply() {
        let db = compile_defs_from_str("base", &defs(ACTORS)).expect("compile");
        let echo = db
            .actor_def_id_by_name("actor.echo")
            .and_then(|id| db.actor_def(id))
            .expect("echo");
        assert!((echo.move_speed - DEFAULT_MOVE_SPEED).abs() < f32::EPSILON);
        assert!(echo.has_recorder);
    }

    #[test]
    fn recorder_flag_can_be_disabled() {
        let db = compile_defs_from_str(
            "base",
            &defs("<ActorDef><defName>a</defName><label>A</label><recorder>false</recorder></ActorDef>"),
        )
        .expect("compile");
        assert!(!db.actor_defs()[0].has_recorder);

        let err = compile_defs_from_str(
            "base",
            &defs("<ActorDef><defName>a</defName><label>A</label><recorder>yes</recorder></ActorDef>"),
        )
        .expect_err("invalid");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn level_compiles_with_zones_and_resolved_refs() {
        let body = format!(
            "{ACTORS}{}",
            level(&format!(
                r#"{START_ZONE}
                <startZone>
                    <center>10 1 0</center>
                    <halfExtents>1 1 1</halfExtents>
                    <loopDuration>2.5</loopDuration>
                    <maxClones>1</maxClones>
                    <spawnPosition>10 0 3</spawnPosition>
                    <spawnYawDegrees>180</spawnYawDegrees>
                </startZone>
                <endZone><center>0 1 20</center><halfExtents>3, 2, 1</halfExtents></endZone>"#
            ))
        );
        let db = compile_defs_from_str("base", &defs(&body)).expect("compile");
        let level = db.level_def_by_name("level.test").expect("level");

        assert_eq!(db.actor_def(level.player_def).map(|d| d.def_name.as_str()), Some("actor.player"));
        assert_eq!(db.actor_def(level.clone_def).map(|d| d.def_name.as_str()), Some("actor.echo"));
        assert_eq!(level.player_start, Vec3::new(0.0, 0.0, -6.0));
        assert_eq!(level.start_zones.len(), 2);
        assert_eq!(level.start_zones[0].spawn, Pose::at(Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(level.start_zones[0].max_clones, 3);
        assert_eq!(level.start_zones[1].spawn.position, Vec3::new(10.0, 0.0, 3.0));
        assert!((level.start_zones[1].loop_duration_seconds - 2.5).abs() < f32::EPSILON);
        assert_eq!(level.end_zones[0].half_extents, Vec3::new(3.0, 2.0, 1.0));
    }

    #[test]
    fn unknown_actor_reference_errors() {
        let body = format!(
            "<ActorDef><defName>actor.player</defName><label>P</label></ActorDef>{}",
            level(START_ZONE)
        );
        let err = compile_defs_from_str("base", &defs(&body)).expect_err("unresolved");
        assert_eq!(err.code, ContentErrorCode::UnknownReference);
        assert!(err.message.contains("actor.echo"));
        assert!(err.location.is_some());
    }

    #[test]
    fn non_positive_loop_duration_errors() {
        let zone = START_ZONE.replace("<loopDuration>4</loopDuration>", "<loopDuration>0</loopDuration>");
        let body = format!("{ACTORS}{}", level(&zone));
        let err = compile_defs_from_str("base", &defs(&body)).expect_err("invalid");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_vector_errors() {
        let body = format!("{ACTORS}{}", level(START_ZONE)).replace("0 0 -6", "0 0");
        let err = compile_defs_from_str("base", &defs(&body)).expect_err("invalid");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn missing_def_name_reports_mod_file_and_location() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            &defs("<ActorDef><label>X</label></ActorDef>"),
        );
        let err = compile_def_database(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert_eq!(err.mod_id, "base");
        assert!(err
            .file_path
            .ends_with(Path::new("assets").join("base").join("defs.xml")));
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_field_and_def_type_error() {
        let err = compile_defs_from_str(
            "base",
            &defs("<ActorDef><defName>a</defName><label>A</label><mood>Happy</mood></ActorDef>"),
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);

        let err = compile_defs_from_str("base", &defs("<EntityDef/>")).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn duplicate_scalar_field_errors_but_zones_repeat() {
        let err = compile_defs_from_str(
            "base",
            &defs("<ActorDef><defName>a</defName><defName>b</defName><label>A</label></ActorDef>"),
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);

        let body = format!("{ACTORS}{}", level(&format!("{START_ZONE}{START_ZONE}")));
        let db = compile_defs_from_str("base", &defs(&body)).expect("repeatable zones");
        assert_eq!(db.level_defs()[0].start_zones.len(), 2);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile_defs_from_str("base", "<Defs><ActorDef><defName>a</defName></Defs>")
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn invalid_root_errors() {
        let err = compile_defs_from_str("base", "<Things/>").expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidRoot);
    }

    #[test]
    fn same_mod_duplicate_def_errors() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("a.xml"),
            &defs("<ActorDef><defName>a</defName><label>A</label></ActorDef>"),
        );
        write_file(
            &app.base_content_dir.join("nested").join("b.xml"),
            &defs("<ActorDef><defName>a</defName><label>B</label></ActorDef>"),
        );
        let err = compile_def_database(&app, &ContentRequest::default()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDefInMod);
        assert!(err.file_path.ends_with(Path::new("nested").join("b.xml")));
    }

    #[test]
    fn cross_mod_duplicate_is_last_mod_wins() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("defs.xml"),
            &defs("<ActorDef><defName>actor.player</defName><label>Base</label><moveSpeed>1.0</moveSpeed></ActorDef>"),
        );
        write_file(
            &app.mods_dir.join("fast").join("defs.xml"),
            &defs("<ActorDef><defName>actor.player</defName><label>Mod</label><moveSpeed>7.0</moveSpeed></ActorDef>"),
        );
        let db = compile_def_database(
            &app,
            &ContentRequest {
                enabled_mods: vec!["fast".to_string()],
            },
        )
        .expect("compile");
        let id = db.actor_def_id_by_name("actor.player").expect("id");
        let def = db.actor_def(id).expect("def");
        assert_eq!(def.label, "Mod");
        assert!((def.move_speed - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mod_level_may_reference_base_actors() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(&app.base_content_dir.join("actors.xml"), &defs(ACTORS));
        write_file(
            &app.mods_dir.join("extra").join("levels.xml"),
            &defs(&level(START_ZONE)),
        );
        let db = compile_def_database(
            &app,
            &ContentRequest {
                enabled_mods: vec!["extra".to_string()],
            },
        )
        .expect("compile");
        assert!(db.level_def_by_name("level.test").is_some());
    }

    #[test]
    fn missing_enabled_mod_is_discovery_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        let err = compile_def_database(
            &app,
            &ContentRequest {
                enabled_mods: vec!["ghost".to_string()],
            },
        )
        .expect_err("missing");
        assert_eq!(err.code, ContentErrorCode::Discovery);
        assert_eq!(err.mod_id, "ghost");
    }
}
