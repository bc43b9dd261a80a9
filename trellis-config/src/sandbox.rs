//! Lua sandbox creation
//!
//! Configuration files come from project repositories and are untrusted. The
//! sandbox only opens the table, string and math libraries and cannot load
//! further code. Evaluation is bounded in memory and in executed
//! instructions.

use std::sync::atomic::{AtomicU64, Ordering};

use mlua::{HookTriggers, Lua, LuaOptions, Result as LuaResult, StdLib, Table, VmState};

/// Memory available to one configuration evaluation
pub const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Lua VM instructions one configuration evaluation may execute
pub const DEFAULT_INSTRUCTION_LIMIT: u64 = 10_000_000;

/// The instruction hook fires once per this many instructions
const HOOK_INTERVAL: u32 = 1_000;

/// Resource bounds of one sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub memory: usize,
    pub instructions: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY_LIMIT,
            instructions: DEFAULT_INSTRUCTION_LIMIT,
        }
    }
}

/// Create a restricted Lua sandbox
///
/// The `trellis` module is always registered so that configuration files can
/// wrap their definition in `trellis.define { ... }`.
///
/// # Example
/// ```no_run
/// use trellis_config::sandbox::{create_sandbox, SandboxLimits};
///
/// let lua = create_sandbox(SandboxLimits::default())?;
/// let config: mlua::Table = lua
///     .load(r#"return trellis.define { jobs = { { name = "unit", script = "make test" } } }"#)
///     .eval()?;
/// let jobs: mlua::Table = config.get("jobs")?;
/// assert_eq!(jobs.raw_len(), 1);
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox(limits: SandboxLimits) -> LuaResult<Lua> {
    // IO, OS, PACKAGE, DEBUG and COROUTINE stay closed
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )?;
    lua.set_memory_limit(limits.memory)?;
    set_instruction_limit(&lua, limits.instructions)?;

    let globals = lua.globals();
    globals.set("require", mlua::Nil)?;
    globals.set("dofile", mlua::Nil)?;
    globals.set("loadfile", mlua::Nil)?;
    globals.set("load", mlua::Nil)?;
    globals.set("collectgarbage", mlua::Nil)?;
    // Limit errors must not be catchable from inside the chunk
    globals.set("pcall", mlua::Nil)?;
    globals.set("xpcall", mlua::Nil)?;

    register_trellis_module(&lua)?;

    Ok(lua)
}

/// Abort evaluation once `limit` instructions have run
fn set_instruction_limit(lua: &Lua, limit: u64) -> LuaResult<()> {
    let executed = AtomicU64::new(0);

    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
        move |_, _| {
            let total = executed.fetch_add(u64::from(HOOK_INTERVAL), Ordering::Relaxed)
                + u64::from(HOOK_INTERVAL);
            if total > limit {
                return Err(mlua::Error::runtime(format!(
                    "instruction limit of {} exceeded",
                    limit
                )));
            }
            Ok(VmState::Continue)
        },
    )
}

/// Register the `trellis` helper table
fn register_trellis_module(lua: &Lua) -> LuaResult<()> {
    let trellis = lua.create_table()?;

    // trellis.define(definition) - returns the definition table as-is
    let define_fn = lua.create_function(|_, definition: Table| Ok(definition))?;
    trellis.set("define", define_fn)?;

    // trellis.job(name, job) - names a job table inline
    let job_fn = lua.create_function(|_, (name, job): (String, Table)| {
        job.set("name", name)?;
        Ok(job)
    })?;
    trellis.set("job", job_fn)?;

    lua.globals().set("trellis", trellis)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Lua {
        create_sandbox(SandboxLimits::default()).unwrap()
    }

    #[test]
    fn test_sandbox_basic_lua() {
        let lua = sandbox();

        let result: i32 = lua
            .load(
                r#"
                local t = {a = 1, b = 2}
                return t.a + t.b
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(result, 3);

        let result: String = lua.load(r#"return string.upper("hello")"#).eval().unwrap();
        assert_eq!(result, "HELLO");

        let result: String = lua
            .load(r#"return table.concat({"a", "b"}, ",")"#)
            .eval()
            .unwrap();
        assert_eq!(result, "a,b");
    }

    #[test]
    fn test_sandbox_no_io() {
        let lua = sandbox();

        let has_io: bool = lua.load(r#"return io ~= nil"#).eval().unwrap();
        assert!(!has_io);

        let has_os: bool = lua.load(r#"return os ~= nil"#).eval().unwrap();
        assert!(!has_os);
    }

    #[test]
    fn test_sandbox_no_code_loading() {
        let lua = sandbox();

        for global in ["require", "dofile", "loadfile", "load"] {
            let present: bool = lua
                .load(format!("return {} ~= nil", global))
                .eval()
                .unwrap();
            assert!(!present, "{} should not be available", global);
        }

        let result = lua.load(r#"require("os")"#).exec();
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_has_trellis_module() {
        let lua = sandbox();

        let name: String = lua
            .load(r#"return trellis.define({ jobs = { trellis.job("lint", { script = "x" }) } }).jobs[1].name"#)
            .eval()
            .unwrap();
        assert_eq!(name, "lint");
    }

    #[test]
    fn test_sandbox_memory_limit() {
        let lua = create_sandbox(SandboxLimits {
            memory: 256 * 1024,
            ..SandboxLimits::default()
        })
        .unwrap();

        let result = lua
            .load(
                r#"
                local t = {}
                for i = 1, 10000000 do t[i] = string.rep("x", 64) .. i end
                return #t
            "#,
            )
            .exec();
        assert!(result.is_err());
    }

    #[test]
    fn test_sandbox_instruction_limit() {
        let lua = create_sandbox(SandboxLimits {
            instructions: 100_000,
            ..SandboxLimits::default()
        })
        .unwrap();

        let err = lua.load("while true do end").exec().unwrap_err();
        assert!(err.to_string().contains("instruction limit of 100000 exceeded"));
    }

    #[test]
    fn test_sandbox_instruction_limit_allows_bounded_work() {
        let lua = create_sandbox(SandboxLimits {
            instructions: 1_000_000,
            ..SandboxLimits::default()
        })
        .unwrap();

        let sum: i64 = lua
            .load("local s = 0 for i = 1, 1000 do s = s + i end return s")
            .eval()
            .unwrap();
        assert_eq!(sum, 500500);
    }

    #[test]
    fn test_sandbox_limit_error_not_catchable() {
        let lua = sandbox();

        for global in ["pcall", "xpcall"] {
            let present: bool = lua
                .load(format!("return {} ~= nil", global))
                .eval()
                .unwrap();
            assert!(!present, "{} should not be available", global);
        }
    }
}
