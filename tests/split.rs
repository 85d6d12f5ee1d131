mod common;

use common::{TestRepo, owned};
use git2::Oid;
use subtree_split::{GitVersion, SplitCache, SplitError, SplitResult, split};

struct LibDocs {
    a: Oid,
    b: Oid,
    d: Oid,
    c: Oid,
}

/// A root with `lib/` and `docs/`; B changes lib, D (on a side branch)
/// changes docs only, C merges both and sets lib to `merged_lib`.
fn lib_docs(repo: &TestRepo, merged_lib: &str) -> LibDocs {
    let a = repo.commit(&[], &[("lib/x.txt", "x"), ("docs/y.txt", "y")], "initial\n", 1_000);
    let b = repo.commit(&[a], &[("lib/x.txt", "x2"), ("docs/y.txt", "y")], "tweak lib\n", 2_000);
    let d = repo.commit(&[a], &[("lib/x.txt", "x"), ("docs/y.txt", "y2")], "tweak docs\n", 3_000);
    let c = repo.commit(
        &[b, d],
        &[("lib/x.txt", merged_lib), ("docs/y.txt", "y2")],
        "merge docs\n",
        4_000,
    );
    LibDocs { a, b, d, c }
}

/// Two lib branches where the merge keeps B's side only.
fn diverging_lib(repo: &TestRepo) -> Oid {
    let a = repo.commit(&[], &[("lib/a", "1")], "add a\n", 1_000);
    let b = repo.commit(&[a], &[("lib/a", "1"), ("lib/b", "b")], "add b\n", 2_000);
    let d = repo.commit(&[a], &[("lib/a", "1"), ("lib/d", "d")], "add d\n", 3_000);
    repo.commit(&[b, d], &[("lib/a", "1"), ("lib/b", "b")], "merge d, keeping b\n", 4_000)
}

/// `a -> f` on one line, merged back into `a` with an explicit merge commit
/// whose lib content is `merged_lib`.
fn no_ff_merge(repo: &TestRepo, merged_lib: &str) -> Oid {
    let a = repo.commit(&[], &[("lib/x", "1")], "start\n", 1_000);
    let f = repo.commit(&[a], &[("lib/x", "2")], "feature\n", 2_000);
    repo.commit(&[a, f], &[("lib/x", merged_lib)], "merge feature\n", 3_000)
}

#[test]
fn test_no_ff_merge_keeps_both_parents() {
    let repo = TestRepo::new();
    let merge = no_ff_merge(&repo, "3");

    let result = repo.split_fresh(&["lib"], merge, GitVersion::Latest);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 3);
    let parents = repo.parents(head);
    assert_eq!(parents.len(), 2);
    assert_eq!(repo.files(parents[0]), owned(&[("x", "1")]));
    assert_eq!(repo.files(parents[1]), owned(&[("x", "2")]));
    assert_eq!(repo.parents(parents[1]), vec![parents[0]]);
}

#[test]
fn test_no_ff_merge_without_changes_collapses() {
    let repo = TestRepo::new();
    let merge = no_ff_merge(&repo, "2");

    let result = repo.split_fresh(&["lib"], merge, GitVersion::Latest);
    let head = result.head().unwrap();

    // the merge tree is F', which already contains A'
    assert_eq!(result.created(), 2);
    assert_eq!(repo.files(head), owned(&[("x", "2")]));
    assert_eq!(repo.parents(head).len(), 1);
    assert_eq!(repo.history(head).len(), 2);
}

#[test]
fn test_docs_branch_drops_out_of_merge() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");

    let result = repo.split_fresh(&["lib"], ids.c, GitVersion::Latest);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 3);
    assert_eq!(result.traversed(), 4);
    assert_eq!(repo.files(head), owned(&[("x.txt", "x3")]));

    let parents = repo.parents(head);
    assert_eq!(parents.len(), 1);
    let b_split = parents[0];
    assert_ne!(b_split, ids.b);
    assert_eq!(repo.files(b_split), owned(&[("x.txt", "x2")]));

    let a_split = repo.parents(b_split);
    assert_eq!(a_split.len(), 1);
    assert_eq!(repo.files(a_split[0]), owned(&[("x.txt", "x")]));
    assert!(repo.parents(a_split[0]).is_empty());

    assert_eq!(repo.history(head).len(), 3);
}

#[test]
fn test_content_free_merge_collapses_onto_parent() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x2");

    let result = repo.split_fresh(&["lib"], ids.c, GitVersion::Latest);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 2);
    assert_eq!(result.traversed(), 4);
    assert_eq!(repo.files(head), owned(&[("x.txt", "x2")]));
    assert_eq!(repo.history(head).len(), 2);
}

#[test]
fn test_docs_split_of_same_history() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");

    let result = repo.split_fresh(&["docs"], ids.c, GitVersion::Latest);
    let head = result.head().unwrap();

    // A' and D' only, B and C change nothing under docs
    assert_eq!(result.created(), 2);
    assert_eq!(repo.files(head), owned(&[("y.txt", "y2")]));
    assert_eq!(repo.history(head).len(), 2);
    assert_ne!(head, ids.d);
}

#[test]
fn test_nothing_to_split() {
    let repo = TestRepo::new();
    let first = repo.commit(&[], &[("README.md", "hello")], "readme\n", 1_000);
    let second = repo.commit(&[first], &[("README.md", "hello again")], "more readme\n", 2_000);

    let config = repo
        .config(&["src:lib"])
        .with_origin(second.to_string())
        .with_target("lib-only");
    let result = repo.split(&config);

    assert!(result.is_finished());
    assert_eq!(result.head(), None);
    assert_eq!(result.created(), 0);
    assert_eq!(result.traversed(), 2);
    assert!(repo.repo.find_reference("refs/heads/lib-only").is_err());
}

#[test]
fn test_relocates_and_merges_prefixes() {
    let repo = TestRepo::new();
    let root = repo.commit(
        &[],
        &[("src/a.rs", "fn a() {}"), ("docs/d.md", "# d"), ("README.md", "r")],
        "initial\n",
        1_000,
    );

    let result = repo.split_fresh(&["src:lib", "docs:docs"], root, GitVersion::Latest);
    let head = result.head().unwrap();
    assert_eq!(
        repo.files(head),
        owned(&[("lib/a.rs", "fn a() {}"), ("docs/d.md", "# d")])
    );

    // a prefix without `:to` lands at the root
    let result = repo.split_fresh(&["src:lib", "docs"], root, GitVersion::Latest);
    let head = result.head().unwrap();
    assert_eq!(
        repo.files(head),
        owned(&[("lib/a.rs", "fn a() {}"), ("d.md", "# d")])
    );
}

#[test]
fn test_elided_root_leaves_no_parent() {
    let repo = TestRepo::new();
    let a = repo.commit(&[], &[("docs/y.txt", "y")], "docs first\n", 1_000);
    let b = repo.commit(&[a], &[("docs/y.txt", "y"), ("lib/x.txt", "x")], "add lib\n", 2_000);

    let result = repo.split_fresh(&["lib"], b, GitVersion::Latest);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 1);
    assert!(repo.parents(head).is_empty());
}

#[test]
fn test_identity_and_message_are_copied() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");

    let result = repo.split_fresh(&["lib"], ids.c, GitVersion::Latest);
    let split = repo.repo.find_commit(result.head().unwrap()).unwrap();
    let original = repo.repo.find_commit(ids.c).unwrap();

    assert_eq!(split.message_raw_bytes(), original.message_raw_bytes());
    assert_eq!(split.author().name(), original.author().name());
    assert_eq!(split.author().email(), original.author().email());
    assert_eq!(split.author().when().seconds(), original.author().when().seconds());
    assert_eq!(
        split.author().when().offset_minutes(),
        original.author().when().offset_minutes()
    );
    assert_eq!(split.committer().name(), original.committer().name());
    assert_eq!(
        split.committer().when().offset_minutes(),
        original.committer().when().offset_minutes()
    );
}

#[test]
fn test_same_history_splits_to_same_ids() {
    let left = TestRepo::new();
    let right = TestRepo::new();
    let left_ids = lib_docs(&left, "x3");
    let right_ids = lib_docs(&right, "x3");
    assert_eq!(left_ids.c, right_ids.c);

    let first = left.split_fresh(&["lib"], left_ids.c, GitVersion::Latest);
    let again = left.split_fresh(&["lib"], left_ids.c, GitVersion::Latest);
    let other = right.split_fresh(&["lib"], right_ids.c, GitVersion::Latest);

    assert_eq!(first.head(), again.head());
    assert_eq!(first.head(), other.head());
    assert_eq!(first.created(), again.created());
}

#[test]
fn test_cached_run_matches_fresh_run() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");
    let config = repo.config(&["lib"]).with_origin(ids.c.to_string());

    let cold = repo.split(&config);
    assert!(repo.repo.path().join("subtree-split.db").exists());

    let warm = repo.split(&config);
    assert_eq!(warm.head(), cold.head());
    assert_eq!(warm.created(), cold.created());
    assert_eq!(warm.traversed(), cold.traversed());

    let cache = SplitCache::open(repo.repo.path()).unwrap();
    assert_eq!(cache.len(&config.fingerprint()).unwrap(), 4);
}

#[test]
fn test_new_commits_extend_cached_history() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");
    let first = repo.split(&repo.config(&["lib"]).with_origin(ids.c.to_string()));

    let e = repo.commit(&[ids.c], &[("lib/x.txt", "x4"), ("docs/y.txt", "y2")], "more lib\n", 5_000);
    let second = repo.split(&repo.config(&["lib"]).with_origin(e.to_string()));
    let head = second.head().unwrap();

    assert_eq!(second.traversed(), 5);
    assert_eq!(second.created(), first.created() + 1);
    assert_eq!(repo.parents(head), vec![first.head().unwrap()]);

    let fresh = repo.split_fresh(&["lib"], e, GitVersion::Latest);
    assert_eq!(fresh.head(), second.head());
}

#[test]
fn test_configurations_do_not_share_entries() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");

    let lib = repo.split(&repo.config(&["lib"]).with_origin(ids.c.to_string()));
    let docs = repo.split(&repo.config(&["docs"]).with_origin(ids.c.to_string()));
    assert_ne!(lib.head(), docs.head());

    let cache = SplitCache::open(repo.repo.path()).unwrap();
    assert_eq!(cache.fingerprints().unwrap().len(), 2);
    drop(cache);

    let docs_fresh = repo.split_fresh(&["docs"], ids.c, GitVersion::Latest);
    assert_eq!(docs_fresh.head(), docs.head());
}

#[test]
fn test_scratch_empties_cache() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");
    repo.split(&repo.config(&["lib"]).with_origin(ids.c.to_string()));
    repo.split(&repo.config(&["docs"]).with_origin(ids.c.to_string()));

    let config = repo.config(&["lib"]).with_origin(ids.a.to_string()).with_scratch(true);
    repo.split(&config);

    let cache = SplitCache::open(repo.repo.path()).unwrap();
    assert_eq!(cache.fingerprints().unwrap(), vec![config.fingerprint()]);
    assert_eq!(cache.len(&config.fingerprint()).unwrap(), 1);
}

#[test]
fn test_latest_keeps_merge_with_new_history() {
    let repo = TestRepo::new();
    let merge = diverging_lib(&repo);

    let result = repo.split_fresh(&["lib"], merge, GitVersion::Latest);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 4);
    assert_eq!(repo.parents(head).len(), 2);
    assert_eq!(repo.files(head), owned(&[("a", "1"), ("b", "b")]));
}

#[test]
fn test_legacy_collapses_merge_and_reflows_message() {
    let repo = TestRepo::new();
    let merge = diverging_lib(&repo);

    let result = repo.split_fresh(&["lib"], merge, GitVersion::Legacy);
    let head = result.head().unwrap();

    assert_eq!(result.created(), 3);
    assert_eq!(repo.parents(head).len(), 1);
    assert_eq!(repo.files(head), owned(&[("a", "1"), ("b", "b")]));

    let commit = repo.repo.find_commit(head).unwrap();
    assert_eq!(commit.message_raw_bytes(), b"add b\n\n");
}

#[test]
fn test_workers_match_sequential_run() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");
    let merge = diverging_lib(&repo);
    let top = repo.commit(
        &[ids.c, merge],
        &[("lib/x.txt", "x3"), ("lib/b", "b"), ("docs/y.txt", "y2")],
        "join histories\n",
        6_000,
    );

    let sequential = repo.split_fresh(&["lib"], top, GitVersion::Latest);

    let config = repo
        .config(&["lib"])
        .with_origin(top.to_string())
        .with_scratch(true)
        .with_workers(4);
    let parallel = repo.split(&config);

    assert_eq!(parallel.head(), sequential.head());
    assert_eq!(parallel.created(), sequential.created());
    assert_eq!(parallel.traversed(), sequential.traversed());
    assert_eq!(parallel.traversed(), 9);
}

#[test]
fn test_lower_bound_starts_new_root() {
    let repo = TestRepo::new();
    let a = repo.commit(&[], &[("lib/x", "1")], "one\n", 1_000);
    let b = repo.commit(&[a], &[("lib/x", "2")], "two\n", 2_000);
    let c = repo.commit(&[b], &[("lib/x", "3")], "three\n", 3_000);

    let config = repo
        .config(&["lib"])
        .with_origin(c.to_string())
        .with_commit(b.to_string())
        .with_scratch(true);
    let result = repo.split(&config);
    let head = result.head().unwrap();

    assert_eq!(result.traversed(), 1);
    assert_eq!(result.created(), 1);
    assert!(repo.parents(head).is_empty());
    assert_eq!(repo.files(head), owned(&[("x", "3")]));
}

#[test]
fn test_origin_by_name_and_target_branch() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");
    repo.branch("main", ids.c);
    repo.checkout(ids.c);

    let by_id = repo.split_fresh(&["lib"], ids.c, GitVersion::Latest);
    let by_head = repo.split(&repo.config(&["lib"]).with_target("lib-only"));
    let by_branch = repo.split(&repo.config(&["lib"]).with_origin("main"));

    assert_eq!(by_head.head(), by_id.head());
    assert_eq!(by_branch.head(), by_id.head());

    let target = repo.repo.find_reference("refs/heads/lib-only").unwrap();
    assert_eq!(target.target(), by_id.head());
}

#[test]
fn test_unknown_origin_fails_before_writing() {
    let repo = TestRepo::new();
    lib_docs(&repo, "x3");

    let config = repo.config(&["lib"]).with_origin("no-such-branch");
    let result = SplitResult::new();
    let err = split(&config, &result).unwrap_err();

    assert!(matches!(err, SplitError::ReferenceNotFound(_)));
    assert!(err.is_configuration());
    assert!(!result.is_finished());
    assert!(!repo.repo.path().join("subtree-split.db").exists());
}

#[test]
fn test_unknown_lower_bound_fails() {
    let repo = TestRepo::new();
    let ids = lib_docs(&repo, "x3");

    let config = repo
        .config(&["lib"])
        .with_origin(ids.c.to_string())
        .with_commit("0123456789012345678901234567890123456789");
    let err = split(&config, &SplitResult::new()).unwrap_err();
    assert!(matches!(err, SplitError::ReferenceNotFound(_)));
}

#[test]
fn test_missing_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    let prefixes = subtree_split::PrefixSet::parse(&["lib"]).unwrap();
    let config = subtree_split::SplitConfig::new(dir.path().join("missing"), prefixes);

    let err = split(&config, &SplitResult::new()).unwrap_err();
    assert!(matches!(err, SplitError::RepoNotFound(_)));
}
