/// Router Module Index
///
/// Organizes the routing into three modules by the access level their pages need. The
/// grouping documents intent: access itself is decided by the authorization gate, which
/// evaluates the ordered policy table for every request whichever module a route lives in.
/// A route added to the wrong module is therefore still protected by its policy rule, and a
/// route with no specific rule falls to the catch-all "authenticated only" rule.

/// Routes reachable without a session: registration, login, logout, health and static assets.
/// Each path here has an explicit `Public` rule in the policy table.
pub mod public;

/// Routes any signed-in principal may reach, whatever its roles.
pub mod authenticated;

/// Pages restricted to particular roles (`/admin`, `/employees`, `/leader`).
/// The required roles live in the policy table, next to the other rules.
pub mod roles;
