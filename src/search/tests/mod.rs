mod cube;
